//! Non-blocking filtering of final values.

use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;

use super::{Outputs, Stream};
use crate::output::{Datum, Output};
use crate::Result;

type PredicateFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// A stream keeping only the upstream final values that satisfy a predicate.
///
/// Constructed via [`StreamOps::filter`](crate::StreamOps::filter).
pub struct Filter<S: Stream> {
    upstream: Arc<S>,
    label: String,
    predicate: Arc<PredicateFn<S::Output>>,
}

impl<S: Stream> Filter<S> {
    /// Create a new filter stream.
    pub fn new(upstream: S, predicate: Arc<PredicateFn<S::Output>>) -> Self {
        let label = format!("{}@filter", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            predicate,
        }
    }
}

impl<S> Stream for Filter<S>
where
    S: Stream + 'static,
{
    type Input = S::Input;
    type Output = S::Output;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: S::Input) -> Outputs<S::Output> {
        let upstream = self.upstream.invoke(input);
        Box::pin(filter_outputs(upstream, self.label.clone(), Arc::clone(&self.predicate)))
    }
}

fn filter_outputs<T: Datum>(
    mut upstream: Outputs<T>,
    label: String,
    predicate: Arc<PredicateFn<T>>,
) -> impl futures::Stream<Item = Result<Output<T>>> + Send + 'static {
    try_stream! {
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            if let Some(value) = value {
                if predicate(&value) {
                    yield Output::new(label.clone(), value, true);
                }
            }
        }
    }
}
