//! Helpers for plain asynchronous sequences of values.
//!
//! These mirror the stream operators for sequences that are not stream
//! invocations, such as the values a producer yields.

use futures::future::{join_all, BoxFuture};
use futures::{FutureExt, StreamExt, TryStreamExt};

use crate::Result;

/// Turn values into a fallible asynchronous sequence, convenient for producers.
///
/// # Example
///
/// ```rust
/// use llm_stream::sequence::{as_stream, collect};
///
/// # tokio_test::block_on(async {
/// assert_eq!(collect(as_stream(1..=3)).await.unwrap(), vec![1, 2, 3]);
/// # });
/// ```
pub fn as_stream<I>(values: I) -> impl futures::Stream<Item = Result<I::Item>> + Send + 'static
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    futures::stream::iter(values.into_iter().map(Ok))
}

/// Collect a sequence into a list, stopping at the first error.
pub async fn collect<T, S>(values: S) -> Result<Vec<T>>
where
    S: futures::Stream<Item = Result<T>>,
{
    values.try_collect().await
}

/// Collect a string sequence and join it with `separator`.
pub async fn join<T, S>(values: S, separator: &str) -> Result<String>
where
    T: AsRef<str>,
    S: futures::Stream<Item = Result<T>>,
{
    let values = collect(values).await?;
    let parts: Vec<&str> = values.iter().map(<T as AsRef<str>>::as_ref).collect();
    Ok(parts.join(separator))
}

/// Drain every sequence concurrently on the current task, keeping their order.
pub async fn gather<T, S>(sequences: Vec<S>) -> Result<Vec<Vec<T>>>
where
    S: futures::Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let drains: Vec<BoxFuture<'static, Result<Vec<T>>>> =
        sequences.into_iter().map(|sequence| collect(sequence).boxed()).collect();
    join_all(drains).await.into_iter().collect()
}

/// Pull the next value of a sequence, `None` once it is exhausted.
pub async fn next_item<T, S>(values: &mut S) -> Result<Option<T>>
where
    S: futures::Stream<Item = Result<T>> + Unpin,
{
    values.next().await.transpose()
}
