use std::net::SocketAddr;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use docgate_pool::PoolConfig;
use docgate_server::GatewayConfig;

#[derive(Debug, Parser)]
#[command(
    name = "docgate",
    about = "Document gateway: JSON over HTTP into backend hashes, optionally mirrored to a stream",
    version
)]
pub struct Cli {
    /// Backend host.
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Backend port.
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    /// Persistent backend connections.
    #[arg(long, env = "REDIS_POOL_SIZE", default_value_t = 5)]
    pub pool_size: usize,

    /// Outstanding commands allowed per connection before callers wait.
    #[arg(long, env = "REDIS_POOL_SCALE_FACTOR", default_value_t = 1)]
    pub pool_scale_factor: usize,

    /// Health-check interval, e.g. `90s` or `1m30s`.
    #[arg(long, env = "REDIS_PING_INTERVAL", default_value = "90s", value_parser = parse_duration)]
    pub ping_interval: Duration,

    /// Commands per pipelined write.
    #[arg(long, env = "FLUSH_SIZE", default_value_t = 10)]
    pub flush_size: usize,

    /// Longest a command waits to be batched, e.g. `150us`.
    #[arg(long, env = "FLUSH_INTERVAL", default_value = "150us", value_parser = parse_duration)]
    pub flush_interval: Duration,

    /// Dial the backend, build the routes, then exit.
    #[arg(long, env = "RUN_ONCE", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub run_once: bool,

    /// Mirror every write to the stream.
    #[arg(long, env = "REDIS_STREAM_OUT", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub stream_out: bool,

    #[arg(long, env = "REDIS_STREAM_NAME", default_value = "raggs")]
    pub stream_name: String,

    /// HTTP listen address.
    #[arg(long = "listen", env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            addr: format!("{}:{}", self.redis_host, self.redis_port),
            size: self.pool_size,
            scale_factor: self.pool_scale_factor,
            ping_interval: self.ping_interval,
            flush_interval: self.flush_interval,
            flush_size: self.flush_size,
            ..PoolConfig::default()
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            listen_addr: self.listen,
            stream_out: self.stream_out,
            stream_name: self.stream_name.clone(),
            ..GatewayConfig::default()
        }
    }
}

/// Parse a duration written as a sequence of `<number><unit>` terms, such as
/// `150us`, `90s` or `1m30s`. Units are `ns`, `us` (or `µs`), `ms`, `s`, `m`
/// and `h`; a bare `0` is also accepted.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".into());
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration {input:?}: expected a number"))?;

        let split = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(split);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("invalid duration {input:?}: missing unit")),
            other => return Err(format!("invalid duration {input:?}: unknown unit {other:?}")),
        };
        nanos += value * scale;
        rest = tail;
    }

    if nanos > u64::MAX as f64 {
        return Err(format!("invalid duration {input:?}: too large"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}
