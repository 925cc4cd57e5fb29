//! Blocking composition: wait for every final value, then continue.

use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;

use super::{Outputs, Stream, TransformFn};
use crate::output::{Datum, Output};
use crate::Result;

/// Two streams composed sequentially: every final value of `A`, in arrival
/// order, becomes the input of one invocation of `B`.
///
/// The outputs of `B` keep their own labels and finality, so the composed
/// stream carries `B`'s label.
/// Constructed via [`StreamOps::and_then`](crate::StreamOps::and_then).
pub struct AndThen<A, B> {
    first: Arc<A>,
    second: Arc<B>,
}

impl<A, B> AndThen<A, B> {
    /// Create a new chained stream.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first: Arc::new(first),
            second: Arc::new(second),
        }
    }
}

impl<A, B> Stream for AndThen<A, B>
where
    A: Stream + 'static,
    B: Stream<Input = Vec<A::Output>> + 'static,
{
    type Input = A::Input;
    type Output = B::Output;

    fn label(&self) -> &str {
        self.second.label()
    }

    fn invoke(&self, input: A::Input) -> Outputs<B::Output> {
        let upstream = self.first.invoke(input);
        Box::pin(and_then_outputs(upstream, Arc::clone(&self.second)))
    }
}

fn and_then_outputs<T, B>(
    mut upstream: Outputs<T>,
    second: Arc<B>,
) -> impl futures::Stream<Item = Result<Output<B::Output>>> + Send + 'static
where
    T: Datum,
    B: Stream<Input = Vec<T>> + 'static,
{
    try_stream! {
        let mut values = Vec::new();
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            values.extend(value);
        }

        let mut next = second.invoke(values);
        while let Some(item) = next.next().await {
            yield item?;
        }
    }
}

/// A stream applying a function to every final value of its upstream at once.
///
/// The result is emitted as a single final output labeled `<upstream>@and_then`.
/// Constructed via [`StreamOps::and_then_fn`](crate::StreamOps::and_then_fn)
/// and [`StreamOps::and_then_async`](crate::StreamOps::and_then_async).
pub struct AndThenFn<S: Stream, V> {
    upstream: Arc<S>,
    label: String,
    f: Arc<TransformFn<Vec<S::Output>, V>>,
}

impl<S: Stream, V> AndThenFn<S, V> {
    /// Create a new and-then stream.
    pub fn new(upstream: S, f: Arc<TransformFn<Vec<S::Output>, V>>) -> Self {
        let label = format!("{}@and_then", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            f,
        }
    }
}

impl<S, V> Stream for AndThenFn<S, V>
where
    S: Stream + 'static,
    V: Datum,
{
    type Input = S::Input;
    type Output = V;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: S::Input) -> Outputs<V> {
        let upstream = self.upstream.invoke(input);
        Box::pin(and_then_fn_outputs(upstream, self.label.clone(), Arc::clone(&self.f)))
    }
}

fn and_then_fn_outputs<T: Datum, V: Datum>(
    mut upstream: Outputs<T>,
    label: String,
    f: Arc<TransformFn<Vec<T>, V>>,
) -> impl futures::Stream<Item = Result<Output<V>>> + Send + 'static {
    try_stream! {
        let mut values = Vec::new();
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            values.extend(value);
        }

        let result = f(values).await?;
        yield Output::new(label, result, true);
    }
}
