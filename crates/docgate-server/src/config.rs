use std::net::SocketAddr;

use docgate_types::DEFAULT_MAX_ITEM_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Mirror every successful write to `stream_name`.
    pub stream_out: bool,
    pub stream_name: String,
    /// Largest single element accepted in a bulk array.
    pub max_bulk_item_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            stream_out: false,
            stream_name: "raggs".into(),
            max_bulk_item_size: DEFAULT_MAX_ITEM_SIZE,
        }
    }
}
