//! Foundation types for docgate.
//!
//! Every document that passes through the gateway is described by the types
//! in this crate. Other docgate crates depend on `docgate-types` for the key
//! scheme and the JSON shape of a document.
//!
//! # Key Types
//!
//! - [`Doc`]: the unit of ingestion and retrieval
//! - [`Scalar`]: a single field value (string, number, boolean or null)
//! - [`HashRecord`]: the string-only field set as stored in the backend
//! - [`DocumentCodec`]: JSON decoding of documents and encoding of records
//! - [`ArrayReader`]: incremental reader for bulk JSON arrays

pub mod bulk;
pub mod codec;
pub mod doc;
pub mod error;
pub mod key;

pub use bulk::{ArrayReader, BulkItem, DEFAULT_MAX_ITEM_SIZE};
pub use codec::DocumentCodec;
pub use doc::{DataMap, Doc, HashRecord, Scalar};
pub use error::TypeError;
pub use key::{build_key, composite_key, KEY_DELIMITER};
