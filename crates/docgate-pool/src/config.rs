use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// Configuration for a [`ConnectionPool`](crate::ConnectionPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Backend address as `host:port`.
    pub addr: String,
    /// Number of persistent connections.
    pub size: usize,
    /// Multiplier on `size` giving the outstanding-command limit.
    pub scale_factor: usize,
    /// How often idle connections are pinged and dead ones redialed.
    pub ping_interval: Duration,
    /// Longest a queued command waits for more commands to batch with.
    pub flush_interval: Duration,
    /// Batch size that triggers an immediate write.
    pub flush_size: usize,
    /// Longest `execute` waits for room in the outstanding-command buffer.
    pub full_buffer_timeout: Duration,
    /// Longest a single dial may take.
    pub dial_timeout: Duration,
    /// Longest a connection may owe replies without answering any. Also
    /// bounds the health-check ping.
    pub reply_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".into(),
            size: 5,
            scale_factor: 1,
            ping_interval: Duration::from_secs(90),
            flush_interval: Duration::from_micros(150),
            flush_size: 10,
            full_buffer_timeout: Duration::from_secs(5),
            dial_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Pool with default tuning for the backend at `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Maximum number of commands in flight across the pool.
    pub fn buffer_capacity(&self) -> usize {
        self.size.saturating_mul(self.scale_factor)
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.size == 0 {
            return Err(PoolError::InvalidConfig("pool size must be at least 1".into()));
        }
        if self.scale_factor == 0 {
            return Err(PoolError::InvalidConfig("scale factor must be at least 1".into()));
        }
        if self.flush_size == 0 {
            return Err(PoolError::InvalidConfig("flush size must be at least 1".into()));
        }
        if self.ping_interval.is_zero() {
            return Err(PoolError::InvalidConfig("ping interval must be positive".into()));
        }
        if self.reply_timeout.is_zero() {
            return Err(PoolError::InvalidConfig("reply timeout must be positive".into()));
        }
        Ok(())
    }
}
