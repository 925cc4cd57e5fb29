//! Low-level access to the raw sequence of final values.

use async_stream::try_stream;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Outputs, Stream};
use crate::output::{Datum, Output};
use crate::Result;

pub(crate) type PipeFn<T, V> =
    dyn Fn(BoxStream<'static, T>) -> BoxStream<'static, Result<V>> + Send + Sync;

/// A stream handing the final values of its upstream to a sequence transform.
///
/// The transform decides on its own when to pull, buffer or reorder values;
/// every value it yields becomes a final output labeled `<upstream>@pipe`.
/// Upstream items are re-emitted as intermediate outputs as they arrive,
/// interleaved with the transform's outputs. The first error from either
/// side ends the invocation.
/// Constructed via [`StreamOps::pipe`](crate::StreamOps::pipe).
pub struct Pipe<S: Stream, V> {
    upstream: Arc<S>,
    label: String,
    f: Arc<PipeFn<S::Output, V>>,
}

impl<S: Stream, V> Pipe<S, V> {
    /// Create a new pipe stream.
    pub fn new(upstream: S, f: Arc<PipeFn<S::Output, V>>) -> Self {
        let label = format!("{}@pipe", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            f,
        }
    }
}

impl<S, V> Stream for Pipe<S, V>
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
        let (tx, rx) = mpsc::unbounded_channel();
        let values = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|value| (value, rx))
        })
        .boxed();

        let label = self.label.clone();
        let piped = (self.f)(values)
            .map(move |value| value.map(|value| Output::new(label.clone(), value, true)));
        let relayed = relay_into(self.upstream.invoke(input), tx);

        Box::pin(until_error(stream::select(relayed, piped).boxed()))
    }
}

/// Re-emit every upstream item and feed its final values into `tx`.
///
/// `tx` is dropped when the upstream ends, which ends the transform's input.
fn relay_into<T: Datum, V: Datum>(
    mut upstream: Outputs<T>,
    tx: mpsc::UnboundedSender<T>,
) -> impl futures::Stream<Item = Result<Output<V>>> + Send + 'static {
    try_stream! {
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            if let Some(value) = value {
                // the transform may stop listening before the upstream ends
                let _ = tx.send(value);
            }
            yield relayed;
        }
    }
}

/// Forward `merged` until its first error, then drop both sides.
fn until_error<V: Datum>(
    mut merged: Outputs<V>,
) -> impl futures::Stream<Item = Result<Output<V>>> + Send + 'static {
    try_stream! {
        while let Some(item) = merged.next().await {
            yield item?;
        }
    }
}
