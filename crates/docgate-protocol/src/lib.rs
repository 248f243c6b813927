//! Backend wire protocol for docgate.
//!
//! The gateway talks to its key-value backend with the Redis serialization
//! protocol (RESP2). Commands are arrays of bulk strings; replies are one of
//! the five RESP2 types. [`RespCodec`] plugs into `tokio_util::codec` on
//! either side of a connection.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{RespCodec, MAX_BULK_LEN};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Command, Reply, STREAM_AUTO_ID};
