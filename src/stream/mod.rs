//! Core stream trait and the closure-backed base stream.
//!
//! This module defines the [`Stream`] trait, the unit of composition,
//! along with [`Producer`] for closure-based streams and [`StreamOps`] for
//! fluent composition.

use async_stream::try_stream;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::sync::Arc;

use crate::debug::DebugStream;
use crate::output::{CapturedError, Datum, Output};
use crate::{Error, Result};

pub mod and_then;
pub mod collect;
pub mod filter;
pub mod gather;
pub mod map;
pub mod on_error;
pub mod pipe;

pub use gather::Deferred;

/// The lazy sequence of outputs produced by one stream invocation.
pub type Outputs<T> = BoxStream<'static, Result<Output<T>>>;

/// A named, composable unit turning one input into a lazy sequence of outputs.
///
/// Invoking a stream never does any work by itself: the returned sequence
/// runs the pipeline as it is polled, and dropping it releases every
/// upstream sequence it holds.
///
/// # Example
///
/// ```rust
/// use llm_stream::{collect_final_output, Producer, Stream, StreamOps};
///
/// # tokio_test::block_on(async {
/// let greet = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello, {name}!")));
/// let polite = greet.map(|greeting: String| format!("{greeting} How are you?"));
///
/// assert_eq!(polite.label(), "Greeting@map");
/// let outputs = collect_final_output(polite.invoke("Alice".to_string())).await.unwrap();
/// assert_eq!(outputs, vec!["Hello, Alice! How are you?".to_string()]);
/// # });
/// ```
pub trait Stream: Send + Sync {
    /// The input type of one invocation.
    type Input: Send + 'static;
    /// The type of the final values produced by this stream.
    type Output: Datum;

    /// The label attached to the items this stream produces.
    fn label(&self) -> &str;

    /// Start one invocation with the given input.
    fn invoke(&self, input: Self::Input) -> Outputs<Self::Output>;
}

/// A type-erased stream.
pub type BoxedStream<I, O> = Box<dyn Stream<Input = I, Output = O>>;

impl<I, O> Stream for BoxedStream<I, O>
where
    I: Send + 'static,
    O: Datum,
{
    type Input = I;
    type Output = O;

    fn label(&self) -> &str {
        (**self).label()
    }

    fn invoke(&self, input: I) -> Outputs<O> {
        (**self).invoke(input)
    }
}

impl<S: Stream + ?Sized> Stream for Arc<S> {
    type Input = S::Input;
    type Output = S::Output;

    fn label(&self) -> &str {
        (**self).label()
    }

    fn invoke(&self, input: S::Input) -> Outputs<S::Output> {
        (**self).invoke(input)
    }
}

type ProduceFn<I, O> = dyn Fn(I) -> BoxStream<'static, Result<O>> + Send + Sync;

/// A base stream backed by a closure.
///
/// Every value the closure yields becomes a final output labeled with the
/// producer's label. This is also the contract external collaborators such
/// as LLM clients satisfy: anything that can turn an input into a lazy
/// sequence of values can be wrapped in a `Producer`.
///
/// # Example
///
/// ```rust
/// use llm_stream::{as_stream, collect_final_output, Producer, Stream};
///
/// # tokio_test::block_on(async {
/// let words = Producer::new("Words", |sentence: String| {
///     as_stream(sentence.split(' ').map(str::to_string).collect::<Vec<_>>())
/// });
///
/// let outputs = collect_final_output(words.invoke("hello there".to_string())).await.unwrap();
/// assert_eq!(outputs, vec!["hello", "there"]);
/// # });
/// ```
pub struct Producer<I, O> {
    label: String,
    produce: Arc<ProduceFn<I, O>>,
}

impl<I, O> Producer<I, O>
where
    I: Send + 'static,
    O: Datum,
{
    /// Create a producer whose closure returns a lazy sequence of values.
    pub fn new<F, S>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> S + Send + Sync + 'static,
        S: futures::Stream<Item = Result<O>> + Send + 'static,
    {
        Self {
            label: label.into(),
            produce: Arc::new(move |input: I| -> BoxStream<'static, Result<O>> {
                f(input).boxed()
            }),
        }
    }

    /// Create a producer whose closure returns a single value.
    pub fn from_fn<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> Result<O> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::new(label, move |input| {
            let f = Arc::clone(&f);
            stream::once(async move { f(input) })
        })
    }

    /// Create a producer whose closure resolves to a single value.
    pub fn from_async<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        Self::new(label, move |input| stream::once(f(input)))
    }
}

impl<I, O> Stream for Producer<I, O>
where
    I: Send + 'static,
    O: Datum,
{
    type Input = I;
    type Output = O;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: I) -> Outputs<O> {
        Box::pin(produce_outputs((self.produce)(input), self.label.clone()))
    }
}

/// Label every produced value as a final output, ending at the first error.
fn produce_outputs<O: Datum>(
    mut values: BoxStream<'static, Result<O>>,
    label: String,
) -> impl futures::Stream<Item = Result<Output<O>>> + Send + 'static {
    try_stream! {
        while let Some(value) = values.next().await {
            yield Output::new(label.clone(), value?, true);
        }
    }
}

pub(crate) type TransformFn<T, V> = dyn Fn(T) -> BoxFuture<'static, Result<V>> + Send + Sync;

/// Extension trait providing fluent composition methods for all [`Stream`] implementors.
///
/// Every method consumes the stream and returns a new one whose label is the
/// upstream label followed by the operator's suffix.
///
/// # Methods
///
/// - [`StreamOps::map`] / [`StreamOps::map_async`]: transform final values as they arrive
/// - [`StreamOps::filter`]: keep final values matching a predicate
/// - [`StreamOps::and_then`]: wait for all values, then hand them to another stream
/// - [`StreamOps::collect`] / [`StreamOps::join`]: wait for all values and combine them
/// - [`StreamOps::gather`]: drain a stream of inner sequences concurrently
/// - [`StreamOps::pipe`]: take over the raw sequence of values
/// - [`StreamOps::on_error`]: replace a failure with a fallback output
/// - [`StreamOps::debug`]: print every output as it flows
pub trait StreamOps: Stream + Sized + 'static {
    /// Transform each final value of this stream as it arrives.
    ///
    /// # Example
    ///
    /// ```rust
    /// use llm_stream::{as_stream, collect_final_output, Producer, Stream, StreamOps};
    ///
    /// # tokio_test::block_on(async {
    /// let numbers = Producer::new("Numbers", |n: u32| as_stream(0..n)).map(|x: u32| x * 10);
    /// let outputs = collect_final_output(numbers.invoke(3)).await.unwrap();
    /// assert_eq!(outputs, vec![0, 10, 20]);
    /// # });
    /// ```
    fn map<F, V>(self, f: F) -> map::Map<Self, V>
    where
        F: Fn(Self::Output) -> V + Send + Sync + 'static,
        V: Datum,
    {
        map::Map::new(
            self,
            Arc::new(move |value: Self::Output| -> BoxFuture<'static, Result<V>> {
                futures::future::ready(Ok::<V, Error>(f(value))).boxed()
            }),
        )
    }

    /// Like [`StreamOps::map`], with a fallible asynchronous transform.
    fn map_async<F, Fut, V>(self, f: F) -> map::Map<Self, V>
    where
        F: Fn(Self::Output) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
        V: Datum,
    {
        map::Map::new(
            self,
            Arc::new(move |value: Self::Output| -> BoxFuture<'static, Result<V>> {
                f(value).boxed()
            }),
        )
    }

    /// Keep only the final values for which `predicate` holds.
    fn filter<P>(self, predicate: P) -> filter::Filter<Self>
    where
        P: Fn(&Self::Output) -> bool + Send + Sync + 'static,
    {
        filter::Filter::new(self, Arc::new(predicate))
    }

    /// Wait for this stream to finish, then invoke `next` with every final value.
    ///
    /// The outputs of `next` are forwarded with their own labels.
    ///
    /// # Example
    ///
    /// ```rust
    /// use llm_stream::{join_final_output, Producer, Stream, StreamOps};
    ///
    /// # tokio_test::block_on(async {
    /// let greet = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello, {name}!")));
    /// let polite = Producer::from_fn("Polite", |greetings: Vec<String>| {
    ///     Ok(format!("{} How are you?", greetings.concat()))
    /// });
    ///
    /// let stream = greet.and_then(polite);
    /// assert_eq!(stream.label(), "Polite");
    /// let text = join_final_output(stream.invoke("Alice".to_string())).await.unwrap();
    /// assert_eq!(text, "Hello, Alice! How are you?");
    /// # });
    /// ```
    fn and_then<N>(self, next: N) -> and_then::AndThen<Self, N>
    where
        N: Stream<Input = Vec<Self::Output>> + 'static,
    {
        and_then::AndThen::new(self, next)
    }

    /// Wait for this stream to finish, then apply `f` to every final value at once.
    fn and_then_fn<F, V>(self, f: F) -> and_then::AndThenFn<Self, V>
    where
        F: Fn(Vec<Self::Output>) -> V + Send + Sync + 'static,
        V: Datum,
    {
        and_then::AndThenFn::new(
            self,
            Arc::new(move |values: Vec<Self::Output>| -> BoxFuture<'static, Result<V>> {
                futures::future::ready(Ok::<V, Error>(f(values))).boxed()
            }),
        )
    }

    /// Like [`StreamOps::and_then_fn`], with a fallible asynchronous function.
    fn and_then_async<F, Fut, V>(self, f: F) -> and_then::AndThenFn<Self, V>
    where
        F: Fn(Vec<Self::Output>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
        V: Datum,
    {
        and_then::AndThenFn::new(
            self,
            Arc::new(move |values: Vec<Self::Output>| -> BoxFuture<'static, Result<V>> {
                f(values).boxed()
            }),
        )
    }

    /// Wait for this stream to finish and emit its final values as one list.
    fn collect(self) -> collect::Collect<Self> {
        collect::Collect::new(self)
    }

    /// Wait for this string stream to finish and emit its final values concatenated.
    fn join(self) -> collect::Join<Self>
    where
        Self::Output: AsRef<str>,
    {
        collect::Join::new(self, "")
    }

    /// Like [`StreamOps::join`], placing `separator` between values.
    fn join_with(self, separator: impl Into<String>) -> collect::Join<Self>
    where
        Self::Output: AsRef<str>,
    {
        collect::Join::new(self, separator)
    }

    /// Drain every inner sequence produced by this stream concurrently.
    ///
    /// # Example
    ///
    /// ```rust
    /// use llm_stream::{as_stream, collect_final_output, Deferred, Producer, Stream, StreamOps};
    ///
    /// # tokio_test::block_on(async {
    /// let fan_out = Producer::new("Numbers", |n: u32| as_stream(0..n))
    ///     .map(|x: u32| Deferred::from_values(as_stream(vec![x, x + 1])))
    ///     .gather();
    ///
    /// let outputs = collect_final_output(fan_out.invoke(3)).await.unwrap();
    /// assert_eq!(outputs, vec![vec![vec![0, 1], vec![1, 2], vec![2, 3]]]);
    /// # });
    /// ```
    fn gather<V>(self) -> gather::Gather<Self, V>
    where
        Self: Stream<Output = Deferred<V>>,
        V: Datum,
    {
        gather::Gather::new(self)
    }

    /// Hand the raw sequence of final values to `f`; everything it yields is final.
    fn pipe<F, S, V>(self, f: F) -> pipe::Pipe<Self, V>
    where
        F: Fn(BoxStream<'static, Self::Output>) -> S + Send + Sync + 'static,
        S: futures::Stream<Item = Result<V>> + Send + 'static,
        V: Datum,
    {
        pipe::Pipe::new(
            self,
            Arc::new(
                move |values: BoxStream<'static, Self::Output>| -> BoxStream<'static, Result<V>> {
                    f(values).boxed()
                },
            ),
        )
    }

    /// Replace a failure of this stream with the value returned by `handler`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use llm_stream::{collect_final_output, Error, Producer, Stream, StreamOps};
    ///
    /// # tokio_test::block_on(async {
    /// let stream = Producer::from_fn("Greeting", |code: u32| -> llm_stream::Result<String> {
    ///     Err(Error::Execution(format!("{code} I'm a teapot")))
    /// })
    /// .on_error(|err: &Error| format!("Sorry: {err}"));
    ///
    /// let outputs = collect_final_output(stream.invoke(418)).await.unwrap();
    /// assert_eq!(outputs, vec!["Sorry: Execution error: 418 I'm a teapot".to_string()]);
    /// # });
    /// ```
    fn on_error<H>(self, handler: H) -> on_error::OnError<Self>
    where
        H: Fn(&Error) -> Self::Output + Send + Sync + 'static,
    {
        let label = format!("{}@on_error", self.label());
        let recover_label = label.clone();
        on_error::OnError::new(
            self,
            label,
            Arc::new(move |captured: CapturedError| -> Outputs<Self::Output> {
                let output = Output::new(recover_label.clone(), handler(captured.error()), true);
                stream::once(futures::future::ready(Ok(output))).boxed()
            }),
        )
    }

    /// Replace a failure of this stream with the outputs of another invocation.
    fn on_error_stream<H>(self, handler: H) -> on_error::OnError<Self>
    where
        H: Fn(CapturedError) -> Outputs<Self::Output> + Send + Sync + 'static,
    {
        let label = format!("{}@on_error", self.label());
        on_error::OnError::new(self, label, Arc::new(handler))
    }

    /// Print every output of this stream as it flows, without altering it.
    fn debug(self) -> DebugStream<Self> {
        DebugStream::new(self)
    }

    /// Erase the concrete stream type.
    fn boxed(self) -> BoxedStream<Self::Input, Self::Output> {
        Box::new(self)
    }
}

impl<T: Stream + Sized + 'static> StreamOps for T {}
