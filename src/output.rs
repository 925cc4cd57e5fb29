//! Labeled outputs flowing through every stream.
//!
//! Every item a stream invocation yields is an [`Output`]: the label of the
//! stream that produced it, its data, and whether it is a final result of
//! the invocation or an intermediate value re-emitted for observability.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Values that can flow through a pipeline.
///
/// Blanket-implemented for every `Clone + Debug + Send + Sync + 'static` type.
pub trait Datum: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> Datum for T {}

trait Erased: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Erased for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased value re-emitted from an upstream stage.
///
/// Intermediate values keep their concrete type; recover it with
/// [`Intermediate::downcast_ref`].
#[derive(Clone)]
pub struct Intermediate {
    value: Arc<dyn Erased>,
    type_name: &'static str,
}

impl Intermediate {
    /// Erase `value`.
    pub fn new<T: Datum>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the value as `T`, if that is its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.value).as_any().downcast_ref::<T>()
    }

    /// The Rust type name of the erased value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Intermediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.value, f)
    }
}

/// An error intercepted by [`on_error`](crate::StreamOps::on_error) and carried as data.
#[derive(Clone, Debug)]
pub struct CapturedError(Arc<Error>);

impl CapturedError {
    /// Capture `error`.
    pub fn new(error: Error) -> Self {
        Self(Arc::new(error))
    }

    /// The underlying error.
    pub fn error(&self) -> &Error {
        &self.0
    }
}

impl From<Error> for CapturedError {
    fn from(error: Error) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// The data carried by an [`Output`].
#[derive(Clone, Debug)]
pub enum Data<T> {
    /// A value of the emitting stage's own output type.
    Value(T),
    /// A value re-emitted from an upstream stage.
    Intermediate(Intermediate),
    /// An error captured by `on_error`.
    Error(CapturedError),
}

/// One labeled item of a stream invocation.
#[derive(Clone, Debug)]
pub struct Output<T> {
    /// Label of the stream that produced this item.
    pub producer: String,
    /// The carried data.
    pub data: Data<T>,
    /// Whether this item is a terminal result of the invocation.
    pub is_final: bool,
}

impl<T: Datum> Output<T> {
    /// Create an output carrying a value.
    pub fn new(producer: impl Into<String>, value: T, is_final: bool) -> Self {
        Self {
            producer: producer.into(),
            data: Data::Value(value),
            is_final,
        }
    }

    /// Create a non-final output carrying a captured error.
    pub fn captured(producer: impl Into<String>, error: CapturedError) -> Self {
        Self {
            producer: producer.into(),
            data: Data::Error(error),
            is_final: false,
        }
    }

    /// The value, if this output carries one of the stage's own type.
    pub fn value(&self) -> Option<&T> {
        match &self.data {
            Data::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Consume the output, returning its value if it is a final result.
    pub fn into_final_value(self) -> Option<T> {
        match self.data {
            Data::Value(value) if self.is_final => Some(value),
            _ => None,
        }
    }

    /// The captured error, if any.
    pub fn error(&self) -> Option<&CapturedError> {
        match &self.data {
            Data::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Borrow the carried data as `U`, whichever variant holds it.
    pub fn downcast_ref<U: 'static>(&self) -> Option<&U> {
        match &self.data {
            Data::Value(value) => (value as &dyn Any).downcast_ref::<U>(),
            Data::Intermediate(value) => value.downcast_ref::<U>(),
            Data::Error(error) => (error as &dyn Any).downcast_ref::<U>(),
        }
    }

    /// Like [`Output::downcast_ref`], failing with [`Error::TypeMismatch`].
    pub fn try_data<U: 'static>(&self) -> Result<&U> {
        self.downcast_ref::<U>().ok_or_else(|| Error::TypeMismatch {
            producer: self.producer.clone(),
            expected: std::any::type_name::<U>(),
            found: self.type_name(),
        })
    }

    /// The Rust type name of the carried data.
    pub fn type_name(&self) -> &'static str {
        match &self.data {
            Data::Value(_) => std::any::type_name::<T>(),
            Data::Intermediate(value) => value.type_name(),
            Data::Error(_) => std::any::type_name::<CapturedError>(),
        }
    }

    /// Whether the carried data is a string.
    pub fn is_text(&self) -> bool {
        match &self.data {
            Data::Value(value) => as_text(value).is_some(),
            Data::Intermediate(value) => as_text((*value.value).as_any()).is_some(),
            Data::Error(_) => false,
        }
    }

    /// Human-readable text of the carried data: strings verbatim, anything
    /// else in its `Debug` form.
    pub fn render(&self) -> String {
        match &self.data {
            Data::Value(value) => match as_text(value) {
                Some(text) => text.to_string(),
                None => format!("{value:?}"),
            },
            Data::Intermediate(value) => match as_text((*value.value).as_any()) {
                Some(text) => text.to_string(),
                None => format!("{value:?}"),
            },
            Data::Error(error) => error.to_string(),
        }
    }

    /// Re-emit this output from a downstream stage: same label, never final.
    pub fn into_intermediate<V>(self) -> Output<V> {
        let data = match self.data {
            Data::Value(value) => Data::Intermediate(Intermediate::new(value)),
            Data::Intermediate(value) => Data::Intermediate(value),
            Data::Error(error) => Data::Error(error),
        };
        Output {
            producer: self.producer,
            data,
            is_final: false,
        }
    }

    /// Split an upstream output into its non-final re-emission and, when it
    /// was a final result of the upstream, its value.
    pub(crate) fn relay<V>(self) -> (Output<V>, Option<T>) {
        let value = match &self.data {
            Data::Value(value) if self.is_final => Some(value.clone()),
            _ => None,
        };
        (self.into_intermediate(), value)
    }
}

fn as_text(value: &dyn Any) -> Option<&str> {
    if let Some(text) = value.downcast_ref::<String>() {
        return Some(text);
    }
    value.downcast_ref::<&'static str>().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_erases_final_values() {
        let output = Output::new("Greeting", "Hello".to_string(), true);
        let (relayed, value): (Output<usize>, _) = output.relay();

        assert_eq!(value.as_deref(), Some("Hello"));
        assert!(!relayed.is_final);
        assert_eq!(relayed.producer, "Greeting");
        assert_eq!(relayed.downcast_ref::<String>().map(String::as_str), Some("Hello"));
        assert!(relayed.value().is_none());
    }

    #[test]
    fn test_relay_skips_intermediate_values() {
        let output = Output::new("Greeting", 3u32, false);
        let (relayed, value): (Output<u32>, _) = output.relay();
        assert!(value.is_none());
        assert_eq!(relayed.downcast_ref::<u32>(), Some(&3));
    }

    #[test]
    fn test_try_data_reports_type_mismatch() {
        let output = Output::new("Counter", 7u32, true);
        assert_eq!(*output.try_data::<u32>().unwrap(), 7);

        match output.try_data::<String>().unwrap_err() {
            Error::TypeMismatch { producer, found, .. } => {
                assert_eq!(producer, "Counter");
                assert_eq!(found, "u32");
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(Output::new("A", "hi".to_string(), true).render(), "hi");
        assert_eq!(Output::new("A", vec![1, 2], true).render(), "[1, 2]");

        let erased: Output<()> = Output::new("A", "hi".to_string(), true).into_intermediate();
        assert_eq!(erased.render(), "hi");
        assert!(erased.is_text());

        let error: Output<String> = Output::captured("A", Error::from("boom").into());
        assert_eq!(error.render(), "boom");
        assert!(!error.is_final);
        assert!(error.into_final_value().is_none());
    }
}
