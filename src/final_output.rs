//! Reduce an invocation to its final values.
//!
//! These helpers consume the sequence returned by
//! [`Stream::invoke`](crate::Stream::invoke) and discard every intermediate
//! output. Errors yielded by the sequence are propagated, ending the
//! reduction.

use futures::{future, TryStreamExt};

use crate::output::{Datum, Output};
use crate::Result;

/// Keep only the final values of an invocation, as they arrive.
///
/// # Example
///
/// ```rust
/// use futures::TryStreamExt;
/// use llm_stream::{filter_final_output, Producer, Stream, StreamOps};
///
/// # tokio_test::block_on(async {
/// let greet = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello, {name}!")));
/// let polite = greet.map(|greeting: String| format!("{greeting} How are you?"));
///
/// let finals: Vec<String> = filter_final_output(polite.invoke("Alice".to_string()))
///     .try_collect()
///     .await
///     .unwrap();
/// assert_eq!(finals, vec!["Hello, Alice! How are you?".to_string()]);
/// # });
/// ```
pub fn filter_final_output<T, S>(outputs: S) -> impl futures::Stream<Item = Result<T>>
where
    T: Datum,
    S: futures::Stream<Item = Result<Output<T>>>,
{
    outputs.try_filter_map(|output| future::ready(Ok(output.into_final_value())))
}

/// Wait for an invocation to finish and return its final values in order.
pub async fn collect_final_output<T, S>(outputs: S) -> Result<Vec<T>>
where
    T: Datum,
    S: futures::Stream<Item = Result<Output<T>>>,
{
    filter_final_output(outputs).try_collect().await
}

/// Wait for a string invocation to finish and concatenate its final values.
///
/// # Example
///
/// ```rust
/// use llm_stream::{as_stream, join_final_output, Producer, Stream};
///
/// # tokio_test::block_on(async {
/// let greet = Producer::new("Greeting", |name: String| {
///     as_stream(vec!["Hello, ".to_string(), name, "!".to_string()])
/// });
/// let text = join_final_output(greet.invoke("Alice".to_string())).await.unwrap();
/// assert_eq!(text, "Hello, Alice!");
/// # });
/// ```
pub async fn join_final_output<T, S>(outputs: S) -> Result<String>
where
    T: Datum + AsRef<str>,
    S: futures::Stream<Item = Result<Output<T>>>,
{
    filter_final_output(outputs)
        .try_fold(String::new(), |mut text, value| {
            text.push_str(value.as_ref());
            future::ready(Ok(text))
        })
        .await
}
