//! Backend command execution for docgate.
//!
//! Everything that talks to the key-value backend goes through the
//! [`Executor`] trait: one command in, one reply (or error) out.
//! [`HashStore`] layers the handful of typed operations the gateway needs on
//! top of any executor.
//!
//! # Executors
//!
//! - `docgate_pool::ConnectionPool` -- pipelined TCP connections to a real backend
//! - [`InMemoryBackend`] -- in-process backend for tests and local runs
//!
//! # Design Rules
//!
//! 1. Executors are shared across request tasks; `execute` takes `&self`.
//! 2. Every command gets its own result; one failure never poisons another.
//! 3. Backend error replies surface as [`StoreError::Command`], never panics.

pub mod error;
pub mod memory;
pub mod ops;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use ops::HashStore;
pub use traits::Executor;
