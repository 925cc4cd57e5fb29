//! Blocking aggregation of final values into a single output.

use async_stream::try_stream;
use futures::StreamExt;
use std::sync::Arc;

use super::{Outputs, Stream};
use crate::output::{Datum, Output};
use crate::Result;

/// A stream emitting every final value of its upstream as one list.
///
/// Constructed via [`StreamOps::collect`](crate::StreamOps::collect).
pub struct Collect<S> {
    upstream: Arc<S>,
    label: String,
}

impl<S: Stream> Collect<S> {
    /// Create a new collect stream.
    pub fn new(upstream: S) -> Self {
        let label = format!("{}@collect", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
        }
    }
}

impl<S> Stream for Collect<S>
where
    S: Stream + 'static,
{
    type Input = S::Input;
    type Output = Vec<S::Output>;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: S::Input) -> Outputs<Vec<S::Output>> {
        let upstream = self.upstream.invoke(input);
        let label = self.label.clone();
        Box::pin(collect_outputs(upstream, move |values| Output::new(label, values, true)))
    }
}

/// A stream emitting the final string values of its upstream concatenated.
///
/// Constructed via [`StreamOps::join`](crate::StreamOps::join) and
/// [`StreamOps::join_with`](crate::StreamOps::join_with).
pub struct Join<S> {
    upstream: Arc<S>,
    label: String,
    separator: String,
}

impl<S: Stream> Join<S> {
    /// Create a new join stream placing `separator` between values.
    pub fn new(upstream: S, separator: impl Into<String>) -> Self {
        let label = format!("{}@join", upstream.label());
        Self {
            upstream: Arc::new(upstream),
            label,
            separator: separator.into(),
        }
    }
}

impl<S> Stream for Join<S>
where
    S: Stream + 'static,
    S::Output: AsRef<str>,
{
    type Input = S::Input;
    type Output = String;

    fn label(&self) -> &str {
        &self.label
    }

    fn invoke(&self, input: S::Input) -> Outputs<String> {
        let upstream = self.upstream.invoke(input);
        let label = self.label.clone();
        let separator = self.separator.clone();
        Box::pin(collect_outputs(upstream, move |values: Vec<S::Output>| {
            let parts: Vec<&str> = values.iter().map(<S::Output as AsRef<str>>::as_ref).collect();
            Output::new(label, parts.join(&separator), true)
        }))
    }
}

/// Drain `upstream`, re-emitting its items, then emit `finish(values)`.
fn collect_outputs<T, V, F>(
    mut upstream: Outputs<T>,
    finish: F,
) -> impl futures::Stream<Item = Result<Output<V>>> + Send + 'static
where
    T: Datum,
    V: Datum,
    F: FnOnce(Vec<T>) -> Output<V> + Send + 'static,
{
    try_stream! {
        let mut values = Vec::new();
        while let Some(item) = upstream.next().await {
            let (relayed, value) = item?.relay();
            yield relayed;
            values.extend(value);
        }
        yield finish(values);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{describe, row, tokens};
    use crate::{as_stream, collect_final_output, join_final_output, Producer, Stream, StreamOps};

    #[tokio::test]
    async fn test_it_collects_the_outputs_to_a_list() {
        let stream = Producer::new("Range", |n: u32| as_stream(0..n)).map(|x: u32| x + 1).collect();

        assert_eq!(stream.label(), "Range@map@collect");
        let rows = describe(stream.invoke(2)).await;
        assert_eq!(
            rows,
            vec![
                row("Range", "0", false),
                row("Range@map", "1", false),
                row("Range", "1", false),
                row("Range@map", "2", false),
                row("Range@map@collect", "[1, 2]", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_of_an_empty_stream_is_one_empty_list() {
        let stream = Producer::new("Range", |n: u32| as_stream(0..n)).collect();
        assert_eq!(collect_final_output(stream.invoke(0)).await.unwrap(), vec![Vec::<u32>::new()]);
    }

    #[tokio::test]
    async fn test_it_joins_string_outputs() {
        let stream = tokens("Words").map(|word: String| word.to_uppercase()).join();
        assert_eq!(stream.label(), "Words@map@join");
        let text = join_final_output(stream.invoke("this is an example".to_string())).await;
        assert_eq!(text.unwrap(), "THIS IS AN EXAMPLE");
    }

    #[tokio::test]
    async fn test_it_joins_with_a_separator() {
        let stream = Producer::new("Words", |sentence: String| {
            as_stream(sentence.split(' ').map(str::to_string).collect::<Vec<_>>())
        })
        .map(|word: String| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .join_with(" ");

        let outputs = collect_final_output(stream.invoke("this is an example".to_string()))
            .await
            .unwrap();
        assert_eq!(outputs, vec!["This Is An Example".to_string()]);
    }

    #[tokio::test]
    async fn test_static_str_outputs_can_be_joined() {
        let stream = Producer::new("Static", |_: ()| as_stream(vec!["a", "b", "c"])).join();
        assert_eq!(join_final_output(stream.invoke(())).await.unwrap(), "abc");
    }
}
