//! # llm-stream
//!
//! Labeled, composable async streams for chaining LLM calls in Rust.
//!
//! A [`Stream`] turns one input into a lazy, possibly multi-item sequence of
//! [`Output`]s. Streams compose into pipelines, and every output produced
//! anywhere in a pipeline stays visible to the consumer: items re-emitted
//! from upstream stages are marked intermediate, while the results of the
//! outermost stage are marked final.
//!
//! ## Core Concepts
//!
//! - **Stream**: The trait every pipeline node implements
//! - **Producer**: A base stream backed by a closure, e.g. an LLM client call
//! - **Output**: A labeled item carrying a value, an upstream value or a captured error
//! - **StreamOps**: Fluent composition (`map`, `filter`, `and_then`, `collect`,
//!   `join`, `gather`, `pipe`, `on_error`, `debug`)
//! - **Deferred**: An inner sequence drained concurrently by `gather`
//! - **Final output helpers**: [`collect_final_output`], [`join_final_output`],
//!   [`filter_final_output`]
//!
//! ## Example: Token Pipeline
//!
//! ```rust
//! use llm_stream::{as_stream, Producer, Stream, StreamOps};
//! use futures::StreamExt;
//!
//! # tokio_test::block_on(async {
//! // Split a sentence into word tokens, as an LLM would stream them
//! let words = Producer::new("Words", |sentence: String| {
//!     as_stream(sentence.split(' ').map(str::to_string).collect::<Vec<_>>())
//! });
//!
//! // Capitalize each token as it arrives, then join them
//! let stream = words
//!     .map(|word: String| word.to_uppercase())
//!     .join_with(" ");
//!
//! let mut outputs = stream.invoke("this is an example".to_string());
//! let mut last = None;
//! while let Some(output) = outputs.next().await {
//!     let output = output.unwrap();
//!     if output.is_final {
//!         last = output.value().cloned();
//!     }
//! }
//! assert_eq!(last.as_deref(), Some("THIS IS AN EXAMPLE"));
//! # });
//! ```

pub mod debug;
pub mod error;
pub mod final_output;
pub mod output;
pub mod sequence;
pub mod stream;
pub mod trace;

pub use debug::{debug, DebugFormat, DebugStream, DebugWriter};
pub use error::{Error, Result};
pub use final_output::{collect_final_output, filter_final_output, join_final_output};
pub use output::{CapturedError, Data, Datum, Intermediate, Output};
pub use sequence::as_stream;
pub use trace::{TraceEntry, TraceKind};

// Re-export stream types
pub use stream::and_then::{AndThen, AndThenFn};
pub use stream::collect::{Collect, Join};
pub use stream::filter::Filter;
pub use stream::gather::Gather;
pub use stream::map::Map;
pub use stream::on_error::OnError;
pub use stream::pipe::Pipe;
pub use stream::{BoxedStream, Deferred, Outputs, Producer, Stream, StreamOps};
