//! Concurrent fan-out over a stream of inner sequences.

use async_stream::try_stream;
use futures::future::join_all;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use super::{Outputs, Stream};
use crate::output::{Datum, Output};
use crate::{Error, Result};

enum Inner<V> {
    Outputs(Outputs<V>),
    Values(BoxStream<'static, Result<V>>),
}

/// A single-use handle to an inner sequence, drained by [`gather`](crate::StreamOps::gather).
///
/// Cloning a `Deferred` shares the same sequence: whichever clone is drained
/// first consumes it, and draining another clone afterwards fails with
/// [`Error::Consumed`].
pub struct Deferred<V> {
    inner: Arc<Mutex<Option<Inner<V>>>>,
}

impl<V: Datum> Deferred<V> {
    /// Defer a stream invocation. Its outputs are re-emitted by `gather`, and
    /// its final values make up its result list.
    pub fn new(outputs: Outputs<V>) -> Self {
        Self::wrap(Inner::Outputs(outputs))
    }

    /// Defer a plain sequence of values.
    pub fn from_values<S>(values: S) -> Self
    where
        S: futures::Stream<Item = Result<V>> + Send + 'static,
    {
        Self::wrap(Inner::Values(values.boxed()))
    }

    fn wrap(inner: Inner<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(inner))),
        }
    }

    /// Whether the sequence has not been drained yet.
    pub fn is_pending(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take(&self) -> Option<Inner<V>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drain the sequence, returning the outputs to re-emit and the final values.
    async fn drain(self, producer: String) -> Result<(Vec<Output<V>>, Vec<V>)> {
        match self.take() {
            Some(Inner::Outputs(outputs)) => {
                let outputs: Vec<Output<V>> = outputs.try_collect().await?;
                let values = outputs
                    .iter()
                    .filter(|output| output.is_final)
                    .filter_map(|output| output.value().cloned())
                    .collect();
                Ok((outputs, values))
            }
            Some(Inner::Values(values)) => Ok((Vec::new(), values.try_collect().await?)),
            None => Err(Error::Consumed(producer)),
        }
    }
}

impl<V> Clone for Deferred<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for Deferred<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = self
            .inner
            .lock()
            .map(|inner| inner.is_some())
            .unwrap_or(false);
        f.debug_struct("Deferred").field("pending", &pending).finish()
    }
}

/// A stream draining every inner sequence of its upstream concurrently.
///
/// The upstream is drained first; the inner sequences are then polled together
/// on the current task until all of them are exhausted. The single final
/// output holds one list per inner sequence, in upstream arrival order.
/// Constructed via [`StreamOps::gather`](crate::StreamOps::gather).
pub struct Gather<S, V> {
    upstream: Arc<S>,
    label: String,
    _phantom: PhantomData<fn() -> V>,
}

impl<S: Stream, V> Gather<S, V> {
    /// Create a new gather stream.
    pub fn new(upstream: S) -> Self {
        let label = format!("{}@gather", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            _phantom: PhantomData,
        }
    }
}

impl<S, V> Stream for Gather<S, V>
where
    S: Stream<Output = Deferred<V>> + 'static,
    V: Datum,
{
    type Input = S::Input;
    type Output = Vec<Vec<V>>;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: S::Input) -> Outputs<Vec<Vec<V>>> {
        let upstream = self.upstream.invoke(input);
        let source = self.upstream.label().to_string();
        Box::pin(gather_outputs(upstream, source, self.label.clone()))
    }
}

fn gather_outputs<V: Datum>(
    mut upstream: Outputs<Deferred<V>>,
    source: String,
    label: String,
) -> impl futures::Stream<Item = Result<Output<Vec<Vec<V>>>>> + Send + 'static {
    try_stream! {
        let mut pending = Vec::new();
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            pending.extend(value);
        }

        tracing::debug!(stream = %label, width = pending.len(), "gathering inner sequences");
        let drains = pending.into_iter().map(|deferred| deferred.drain(source.clone()));
        let drained = join_all(drains).await;

        let mut results = Vec::with_capacity(drained.len());
        for inner in drained {
            let (outputs, values) = inner?;
            for output in outputs {
                yield output.into_intermediate();
            }
            results.push(values);
        }
        yield Output::new(label, results, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::tests::{describe, row};
    use crate::{as_stream, collect_final_output, Producer, StreamOps};
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    fn delayed(label: &'static str) -> Producer<(u64, u32), u32> {
        Producer::new(label, |(millis, value): (u64, u32)| {
            futures::stream::once(async move {
                sleep(Duration::from_millis(millis)).await;
                Ok(value)
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_sequences_run_concurrently_and_keep_outer_order() {
        let slow = delayed("Slow");
        let fast = delayed("Fast");
        let stream = Producer::new("Jobs", |_: ()| as_stream(vec![(100u64, 1u32), (50, 2)]))
            .map(move |(millis, value): (u64, u32)| {
                if millis > 75 {
                    Deferred::new(slow.invoke((millis, value)))
                } else {
                    Deferred::new(fast.invoke((millis, value)))
                }
            })
            .gather();

        let started = Instant::now();
        let outputs = collect_final_output(stream.invoke(())).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outputs, vec![vec![vec![1], vec![2]]]);
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_it_gathers_stream_invocations() {
        let increment = Producer::from_fn("Inc", |x: u32| Ok(x + 1));
        let stream = Producer::new("Parallel", |n: u32| as_stream(0..n))
            .map(move |x: u32| Deferred::new(increment.invoke(x)))
            .gather()
            .and_then_fn(|results: Vec<Vec<Vec<u32>>>| {
                results[0].iter().map(|inner| inner[0]).sum::<u32>()
            })
            .map(|total: u32| total.to_string());

        assert_eq!(stream.label(), "Parallel@map@gather@and_then@map");
        let rows = describe(stream.invoke(3)).await;

        let inc_rows: Vec<_> = rows.iter().filter(|(producer, _, _)| producer == "Inc").collect();
        assert_eq!(inc_rows.len(), 3);
        assert!(inc_rows.iter().all(|(_, _, is_final)| !is_final));
        assert_eq!(rows.last().unwrap(), &row("Parallel@map@gather@and_then@map", "6", true));
        assert!(rows.contains(&row("Parallel@map@gather", "[[1], [2], [3]]", false)));
    }

    #[tokio::test]
    async fn test_it_gathers_plain_value_sequences() {
        let stream = Producer::new("Numbers", |n: u32| as_stream(0..n))
            .map(|x: u32| Deferred::from_values(as_stream(vec![x; x as usize])))
            .gather();

        let outputs = collect_final_output(stream.invoke(3)).await.unwrap();
        assert_eq!(outputs, vec![vec![vec![], vec![1], vec![2, 2]]]);
    }

    #[tokio::test]
    async fn test_empty_upstream_gathers_nothing() {
        let stream = Producer::new("Numbers", |n: u32| as_stream(0..n))
            .map(|x: u32| Deferred::from_values(as_stream(vec![x])))
            .gather();
        assert_eq!(
            collect_final_output(stream.invoke(0)).await.unwrap(),
            vec![Vec::<Vec<u32>>::new()]
        );
    }

    #[tokio::test]
    async fn test_inner_errors_propagate() {
        let stream = Producer::new("Numbers", |n: u32| as_stream(0..n))
            .map(|x: u32| {
                Deferred::from_values(futures::stream::iter(vec![if x == 1 {
                    Err(Error::from("inner failure"))
                } else {
                    Ok(x)
                }]))
            })
            .gather();

        let err = collect_final_output(stream.invoke(3)).await.unwrap_err();
        assert_eq!(err.to_string(), "inner failure");
    }

    #[tokio::test]
    async fn test_a_deferred_sequence_is_single_use() {
        let deferred = Deferred::from_values(as_stream(vec![1u32]));
        let copy = deferred.clone();
        assert!(copy.is_pending());

        let (_, values) = deferred.drain("Test".to_string()).await.unwrap();
        assert_eq!(values, vec![1]);
        assert!(!copy.is_pending());
        assert!(matches!(
            copy.drain("Test".to_string()).await,
            Err(Error::Consumed(label)) if label == "Test"
        ));

        let fresh = Deferred::from_values(as_stream(vec![1u32]));
        assert_eq!(format!("{fresh:?}"), "Deferred { pending: true }");
    }
}
