//! Pass-through stream wrapper printing every output as it flows.

use async_stream::try_stream;
use futures::StreamExt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::output::{Data, Datum, Output};
use crate::stream::{Outputs, Stream};
use crate::trace::TraceEntry;
use crate::Result;

// ANSI foreground codes, only written when color is enabled.
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[39m";

/// How a [`DebugStream`] prints outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DebugFormat {
    /// A `> label` header whenever the producer changes, followed by the
    /// data as it arrives. Strings are printed verbatim so token streams
    /// read as text.
    #[default]
    Pretty,
    /// One JSON [`TraceEntry`] per output and line.
    Json,
}

/// Shared destination of debug output.
pub type DebugWriter = Arc<Mutex<dyn Write + Send>>;

/// Wraps any stream, printing every output it yields without altering it.
///
/// The wrapped stream keeps its label, data and finality. Printing failures
/// are logged and never interrupt the pipeline.
///
/// # Example
///
/// ```rust
/// use llm_stream::{debug, join_final_output, Producer, Stream, StreamOps};
///
/// # tokio_test::block_on(async {
/// let greet = Producer::from_fn("Greeting", |name: String| Ok(format!("Hello, {name}!")));
/// let polite = Producer::from_fn("Polite", |greetings: Vec<String>| {
///     Ok(format!("{} How are you?", greetings.concat()))
/// });
///
/// // Prints "> Greeting", then "Hello, Alice!", then "> Polite" and its text.
/// let stream = debug(greet.join().and_then(polite));
/// let text = join_final_output(stream.invoke("Alice".to_string())).await.unwrap();
/// assert_eq!(text, "Hello, Alice! How are you?");
/// # });
/// ```
pub struct DebugStream<S> {
    inner: Arc<S>,
    format: DebugFormat,
    color: bool,
    writer: DebugWriter,
}

/// Wrap `stream` so that every output is printed to stdout.
pub fn debug<S: Stream>(stream: S) -> DebugStream<S> {
    DebugStream::new(stream)
}

impl<S: Stream> DebugStream<S> {
    /// Wrap `inner`, printing in the pretty format to stdout.
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            format: DebugFormat::Pretty,
            color: true,
            writer: Arc::new(Mutex::new(io::stdout())),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: DebugFormat) -> Self {
        self.format = format;
        self
    }

    /// Print to `writer` instead of stdout.
    pub fn with_writer(mut self, writer: DebugWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Enable or disable ANSI colors in the pretty format.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Access the wrapped stream.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> Stream for DebugStream<S>
where
    S: Stream + 'static,
{
    type Input = S::Input;
    type Output = S::Output;

    fn label(&self) -> &str {
        self.inner.label()
    }

    fn invoke(&self, input: S::Input) -> Outputs<S::Output> {
        let printer = Printer {
            format: self.format,
            color: self.color,
            writer: Arc::clone(&self.writer),
            last_producer: String::new(),
            last_rendered: None,
        };
        Box::pin(print_outputs(self.inner.invoke(input), printer))
    }
}

fn print_outputs<T: Datum>(
    mut upstream: Outputs<T>,
    mut printer: Printer,
) -> impl futures::Stream<Item = Result<Output<T>>> + Send + 'static {
    try_stream! {
        while let Some(item) = upstream.next().await {
            let output = item?;
            tracing::trace!(
                producer = %output.producer,
                is_final = output.is_final,
                "stream output"
            );
            if let Err(error) = printer.print(&output) {
                tracing::warn!(%error, "failed to print stream output");
            }
            yield output;
        }
    }
}

/// Per-invocation printing state.
struct Printer {
    format: DebugFormat,
    color: bool,
    writer: DebugWriter,
    last_producer: String,
    last_rendered: Option<String>,
}

impl Printer {
    fn print<T: Datum>(&mut self, output: &Output<T>) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.format == DebugFormat::Json {
            let line = TraceEntry::new(output).to_json_line()?;
            writeln!(&mut *writer, "{line}").map_err(io_error)?;
            return writer.flush().map_err(io_error);
        }

        let rendered = output.render();
        // a value re-emitted under a new label was already printed
        if output.producer != self.last_producer
            && self.last_rendered.as_deref() == Some(rendered.as_str())
        {
            return Ok(());
        }

        if output.producer != self.last_producer {
            self.last_producer = output.producer.clone();
            let (green, reset) = self.palette(GREEN);
            write!(writer, "\n\n{green}> {}{reset}\n\n", output.producer).map_err(io_error)?;
        }

        match &output.data {
            Data::Error(error) => {
                let (red, reset) = self.palette(RED);
                write!(writer, "{red}Error:{reset} {error}").map_err(io_error)?;
            }
            _ if output.is_text() => write!(writer, "{rendered}").map_err(io_error)?,
            _ => write!(writer, "{rendered}, ").map_err(io_error)?,
        }
        writer.flush().map_err(io_error)?;

        self.last_rendered = Some(rendered);
        Ok(())
    }

    fn palette(&self, color: &'static str) -> (&'static str, &'static str) {
        if self.color {
            (color, RESET)
        } else {
            ("", "")
        }
    }
}

fn io_error(error: io::Error) -> crate::Error {
    crate::Error::Other(Box::new(error))
}
