//! Item-by-item transformation of final values.

use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;

use super::{Outputs, Stream, TransformFn};
use crate::output::{Datum, Output};
use crate::Result;

/// A stream applying a transform to each final value of its upstream as it arrives.
///
/// Every upstream item is re-emitted as an intermediate output first, so the
/// transform never delays the upstream's observability channel.
/// Constructed via [`StreamOps::map`](crate::StreamOps::map).
pub struct Map<S: Stream, V> {
    upstream: Arc<S>,
    label: String,
    f: Arc<TransformFn<S::Output, V>>,
}

impl<S: Stream, V> Map<S, V> {
    /// Create a new map stream.
    pub fn new(upstream: S, f: Arc<TransformFn<S::Output, V>>) -> Self {
        let label = format!("{}@map", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            f,
        }
    }
}

impl<S, V> Stream for Map<S, V>
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
        Box::pin(map_outputs(upstream, self.label.clone(), Arc::clone(&self.f)))
    }
}

fn map_outputs<T: Datum, V: Datum>(
    mut upstream: Outputs<T>,
    label: String,
    f: Arc<TransformFn<T, V>>,
) -> impl futures::Stream<Item = Result<Output<V>>> + Send + 'static {
    try_stream! {
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            if let Some(value) = value {
                let mapped = f(value).await?;
                yield Output::new(label.clone(), mapped, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{describe, row, tokens};
    use crate::{as_stream, collect_final_output, Error, Producer, Stream, StreamOps};

    #[tokio::test]
    async fn test_it_maps_values_as_they_arrive() {
        let stream = tokens("Exclamation").map(|token: String| token.to_uppercase());

        assert_eq!(
            describe(stream.invoke("hello world".to_string())).await,
            vec![
                row("Exclamation", "hello ", false),
                row("Exclamation@map", "HELLO ", true),
                row("Exclamation", "world", false),
                row("Exclamation@map", "WORLD", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_it_keeps_order_of_final_values() {
        let stream = Producer::new("Letters", |_: ()| as_stream(vec!['a', 'b', 'c']))
            .map(|c: char| c.to_ascii_uppercase());
        assert_eq!(collect_final_output(stream.invoke(())).await.unwrap(), vec!['A', 'B', 'C']);
    }

    #[tokio::test]
    async fn test_chained_maps_only_transform_their_upstream_finals() {
        let stream = Producer::new("Range", |n: u32| as_stream(0..n))
            .map(|x: u32| x + 1)
            .map(|x: u32| x.to_string());

        assert_eq!(
            describe(stream.invoke(2)).await,
            vec![
                row("Range", "0", false),
                row("Range@map", "1", false),
                row("Range@map@map", "1", true),
                row("Range", "1", false),
                row("Range@map", "2", false),
                row("Range@map@map", "2", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_async_transform_errors_stop_the_invocation() {
        let stream = Producer::new("Range", |n: u32| as_stream(0..n)).map_async(
            |x: u32| async move {
                if x == 1 {
                    Err(Error::Execution("odd one out".to_string()))
                } else {
                    Ok(x * 2)
                }
            },
        );

        let err = collect_final_output(stream.invoke(5)).await.unwrap_err();
        assert!(err.to_string().contains("odd one out"));
    }
}
