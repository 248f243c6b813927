use thiserror::Error;

/// Errors produced while decoding or validating documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed JSON document: {0}")]
    MalformedJson(String),

    #[error("document has no data fields")]
    MissingData,

    #[error("document field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("malformed bulk array: {0}")]
    BulkStructure(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
