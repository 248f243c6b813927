//! Pipelined connection pool for the docgate backend.
//!
//! [`ConnectionPool`] keeps a fixed number of persistent connections to a
//! RESP2 backend and implements [`docgate_store::Executor`] on top of them.
//!
//! # Execution model
//!
//! ```text
//!  execute() ──permit──▶ round-robin ──▶ connection queue
//!                                            │
//!                          writer: collect up to flush_size commands
//!                                  or until flush_interval, one write
//!                                            │
//!                          reader: decode replies in order, complete
//!                                  each caller's oneshot
//! ```
//!
//! - Outstanding commands are bounded by `size × scale_factor` permits; a
//!   caller waits at most `full_buffer_timeout` for one.
//! - A pinger checks idle connections every `ping_interval` and redials
//!   dead ones. Callers never see the swap.

pub mod config;
pub mod error;
pub mod pool;

mod connection;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use pool::{ConnectionPool, PoolStats};
