//! Incremental delivery payloads (@defer/@stream) and upstream result streams.

use crate::result::{ExecutionResult, GraphQLError};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ordered, possibly unbounded, upstream sequence of payloads.
///
/// Errors raised by the data source travel in-band as [`ProducerError`] and
/// are turned into GraphQL `errors` entries by the producer.
pub type ResultStream<T> = BoxStream<'static, Result<T, ProducerError>>;

/// One deferred fragment or one streamed list item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalChunk {
    /// The patch data.
    pub data: serde_json::Value,
    /// Location of the patch. Empty for the initial payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    /// Label of the originating directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Errors raised while resolving this patch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
    /// False on exactly the last chunk of a sequence.
    pub has_next: bool,
}

impl IncrementalChunk {
    /// Starts building a chunk carrying `data`.
    pub fn builder(data: serde_json::Value) -> IncrementalChunkBuilder {
        IncrementalChunkBuilder::new(data)
    }

    /// The initial payload of an incremental sequence.
    pub fn initial(data: serde_json::Value) -> Self {
        Self::builder(data).has_next().build()
    }
}

/// Builder for [`IncrementalChunk`].
#[derive(Debug, Clone)]
pub struct IncrementalChunkBuilder {
    data: serde_json::Value,
    path: Vec<PathSegment>,
    label: Option<String>,
    errors: Vec<GraphQLError>,
    has_next: bool,
}

impl IncrementalChunkBuilder {
    fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            path: Vec::new(),
            label: None,
            errors: Vec::new(),
            has_next: false,
        }
    }

    /// Adds a field path segment.
    pub fn at_field(mut self, field: impl Into<String>) -> Self {
        self.path.push(PathSegment::Field(field.into()));
        self
    }

    /// Adds an index path segment.
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    /// Sets the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds an error.
    pub fn with_error(mut self, error: GraphQLError) -> Self {
        self.errors.push(error);
        self
    }

    /// Marks that more chunks follow.
    pub fn has_next(mut self) -> Self {
        self.has_next = true;
        self
    }

    /// Marks this as the final chunk.
    pub fn last(mut self) -> Self {
        self.has_next = false;
        self
    }

    /// Builds the chunk.
    pub fn build(self) -> IncrementalChunk {
        IncrementalChunk {
            data: self.data,
            path: self.path,
            label: self.label,
            errors: self.errors,
            has_next: self.has_next,
        }
    }
}

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// An error raised by the upstream data source while streaming.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProducerError {
    /// Message surfaced to the client in the `errors` field.
    pub message: String,
    /// Fatal errors end the stream after being delivered.
    pub fatal: bool,
}

impl ProducerError {
    /// An error the source recovers from.
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    /// An error after which the source yields nothing more.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }
}

/// A payload type a producer can deliver, including in-band errors.
pub trait Payload: Send + 'static {
    /// Renders an upstream error as a deliverable payload.
    fn from_producer_error(error: &ProducerError) -> Self;
}

impl Payload for ExecutionResult {
    fn from_producer_error(error: &ProducerError) -> Self {
        ExecutionResult::error(GraphQLError::new(error.message.clone()))
    }
}

impl Payload for IncrementalChunk {
    fn from_producer_error(error: &ProducerError) -> Self {
        IncrementalChunk {
            data: serde_json::Value::Null,
            path: Vec::new(),
            label: None,
            errors: vec![GraphQLError::new(error.message.clone())],
            has_next: !error.fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_chunk_serialization() {
        let chunk = IncrementalChunk::initial(serde_json::json!({"a": 1}));
        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(json, r#"{"data":{"a":1},"hasNext":true}"#);
    }

    #[test]
    fn test_patch_chunk_serialization() {
        let chunk = IncrementalChunk::builder(serde_json::json!({"name": "Ada"}))
            .at_field("books")
            .at_index(0)
            .at_field("author")
            .label("authorDefer")
            .last()
            .build();
        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(
            json,
            r#"{"data":{"name":"Ada"},"path":["books",0,"author"],"label":"authorDefer","hasNext":false}"#
        );
    }

    #[test]
    fn test_fatal_error_chunk_is_last() {
        let chunk = IncrementalChunk::from_producer_error(&ProducerError::fatal("db gone"));
        assert!(!chunk.has_next);
        assert_eq!(chunk.errors[0].message, "db gone");

        let chunk = IncrementalChunk::from_producer_error(&ProducerError::recoverable("retry"));
        assert!(chunk.has_next);
    }

    #[test]
    fn test_error_result_from_producer() {
        let result = ExecutionResult::from_producer_error(&ProducerError::recoverable("tick lost"));
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"data":null,"errors":[{"message":"tick lost"}]}"#
        );
    }
}
