use crate::doc::{Doc, HashRecord};
use crate::error::TypeError;

/// JSON codec for documents and hash records.
pub struct DocumentCodec;

impl DocumentCodec {
    /// Decode one JSON document. Unknown top-level fields are ignored.
    pub fn decode_doc(data: &[u8]) -> Result<Doc, TypeError> {
        serde_json::from_slice(data).map_err(|e| TypeError::MalformedJson(e.to_string()))
    }

    /// Encode a hash record as a flat JSON object of strings.
    pub fn encode_record(record: &HashRecord) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(record).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
