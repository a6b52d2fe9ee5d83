//! Schema validation errors (C2) and their rendering to the wire error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Shape(String),

    #[error("{0}")]
    Bounds(String),

    #[error(
        "Route mismatch: input route points to '{expected}', but output route points to '{actual}'. \
         Actor cannot change its current position in the route."
    )]
    RouteMismatch { expected: String, actual: String },

    #[error("Invalid output message[{index}/{total}]: {source}")]
    Indexed {
        index: usize,
        total: usize,
        #[source]
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Whether this error originated on the input-decode path (vs. output validation).
    /// Input-decode failures map to `msg_parsing_error`; everything else arising
    /// from handler-output validation maps to `processing_error`.
    pub fn is_input_decode(&self) -> bool {
        matches!(self, SchemaError::Decode(_) | SchemaError::Shape(_) | SchemaError::Bounds(_))
    }
}
