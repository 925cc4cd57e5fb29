//! Error capture: turn a failure of a stream into data plus a fallback output.

use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;

use super::{Outputs, Stream};
use crate::output::{CapturedError, Datum, Output};
use crate::Result;

pub(crate) type RecoverFn<T> = dyn Fn(CapturedError) -> Outputs<T> + Send + Sync;

/// A stream intercepting the first error raised while pulling from its upstream.
///
/// Items that arrive normally are passed through untouched. When pulling
/// fails, the error is emitted as a non-final [`Data::Error`](crate::Data::Error)
/// output labeled with the upstream label, the recovery invocation's outputs
/// follow, and the upstream is not pulled again.
/// Constructed via [`StreamOps::on_error`](crate::StreamOps::on_error) and
/// [`StreamOps::on_error_stream`](crate::StreamOps::on_error_stream).
pub struct OnError<S: Stream> {
    upstream: Arc<S>,
    label: String,
    recover: Arc<RecoverFn<S::Output>>,
}

impl<S: Stream> OnError<S> {
    /// Create a new error-capturing stream.
    pub fn new(upstream: S, label: impl Into<String>, recover: Arc<RecoverFn<S::Output>>) -> Self {
        Self {
            upstream: Arc::new(upstream),
            label: label.into(),
            recover,
        }
    }
}

impl<S> Stream for OnError<S>
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
        let source = self.upstream.label().to_string();
        Box::pin(capture_outputs(upstream, source, Arc::clone(&self.recover)))
    }
}

fn capture_outputs<T: Datum>(
    mut upstream: Outputs<T>,
    source: String,
    recover: Arc<RecoverFn<T>>,
) -> impl futures::Stream<Item = Result<Output<T>>> + Send + 'static {
    try_stream! {
        while let Some(item) = upstream.next().await {
            match item {
                Ok(output) => {
                    yield output;
                }
                Err(error) => {
                    let captured = CapturedError::new(error);
                    tracing::warn!(stream = %source, error = %captured, "captured stream error");
                    yield Output::captured(source.clone(), captured.clone());

                    let mut recovery = recover(captured);
                    while let Some(output) = recovery.next().await {
                        yield output?;
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{describe, row};
    use crate::{as_stream, collect_final_output, Data, Error, Producer, Stream, StreamOps};
    use futures::{StreamExt, TryStreamExt};

    fn teapot() -> Producer<String, String> {
        Producer::from_fn("Greeting", |input: String| {
            Err(Error::Execution(format!("{input} I'm a teapot")))
        })
    }

    #[tokio::test]
    async fn test_it_handles_errors() {
        let stream = teapot().on_error(|err: &Error| format!("I'm Sorry Dave: {err}"));
        assert_eq!(stream.label(), "Greeting@on_error");

        let outputs: Vec<_> = stream.invoke("418".to_string()).try_collect().await.unwrap();
        assert_eq!(outputs.len(), 2);

        assert_eq!(outputs[0].producer, "Greeting");
        assert!(!outputs[0].is_final);
        match &outputs[0].data {
            Data::Error(captured) => assert!(matches!(
                captured.error(),
                Error::Execution(msg) if msg == "418 I'm a teapot"
            )),
            other => panic!("expected a captured error, got {other:?}"),
        }

        assert_eq!(outputs[1].producer, "Greeting@on_error");
        assert!(outputs[1].is_final);
        assert_eq!(
            outputs[1].value().map(String::as_str),
            Some("I'm Sorry Dave: Execution error: 418 I'm a teapot")
        );
    }

    #[tokio::test]
    async fn test_it_handles_errors_happening_mid_stream() {
        let stream = Producer::new("Greeting", |input: String| {
            futures::stream::iter(vec![
                Ok("hi".to_string()),
                Ok("there".to_string()),
                Err(Error::Execution(format!("{input} I'm a teapot"))),
                Ok("never pulled".to_string()),
            ])
        })
        .on_error(|_: &Error| "sorry".to_string());

        assert_eq!(
            describe(stream.invoke("418".to_string())).await,
            vec![
                row("Greeting", "hi", true),
                row("Greeting", "there", true),
                row("Greeting", "Execution error: 418 I'm a teapot", false),
                row("Greeting@on_error", "sorry", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_it_passes_through_when_nothing_fails() {
        let stream = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello {name}")))
            .on_error(|_: &Error| "sorry".to_string())
            .and_then_fn(|tokens: Vec<String>| tokens.concat());

        assert_eq!(
            describe(stream.invoke("Dave".to_string())).await,
            vec![
                row("Greeting", "Hello Dave", false),
                row("Greeting@on_error@and_then", "Hello Dave", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_it_handles_errors_only_before_the_handler() {
        let stream = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello {name}")))
            .on_error(|_: &Error| "sorry".to_string())
            .and_then_async(|_: Vec<String>| async {
                Err::<String, _>(Error::from("I'm a teapot"))
            });

        let mut outputs = stream.invoke("Dave".to_string());
        assert_eq!(outputs.next().await.unwrap().unwrap().producer, "Greeting");
        let err = outputs.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("I'm a teapot"));
    }

    #[tokio::test]
    async fn test_recovery_can_forward_another_invocation() {
        let fallback = Producer::new("Fallback", |reason: String| {
            as_stream(vec!["sorry, ".to_string(), reason])
        });
        let stream =
            teapot().on_error_stream(move |captured| fallback.invoke(captured.to_string()));

        let rows = describe(stream.invoke("418".to_string())).await;
        assert_eq!(rows[0], row("Greeting", "Execution error: 418 I'm a teapot", false));
        assert_eq!(
            rows[1..],
            [
                row("Fallback", "sorry, ", true),
                row("Fallback", "Execution error: 418 I'm a teapot", true),
            ]
        );

        let text = crate::join_final_output(stream.invoke("418".to_string())).await.unwrap();
        assert_eq!(text, "sorry, Execution error: 418 I'm a teapot");
    }

    #[tokio::test]
    async fn test_errors_from_the_recovery_propagate() {
        let stream = teapot().on_error_stream(|_| {
            Producer::from_fn("Broken", |_: ()| {
                Err::<String, _>(Error::from("still broken"))
            })
            .invoke(())
        });
        let err = collect_final_output(stream.invoke("418".to_string())).await.unwrap_err();
        assert_eq!(err.to_string(), "still broken");
    }
}
