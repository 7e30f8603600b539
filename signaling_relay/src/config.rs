//! Server configuration and command line

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port used when neither `--port` nor `PORT` is given
pub const DEFAULT_PORT: u16 = 3001;

/// Runtime settings for the relay server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    /// 0 binds an ephemeral port
    pub port: u16,
    /// Outbound messages buffered per connection before drops start
    pub send_queue: usize,
    /// Upper bound on a single socket write
    pub write_timeout: Duration,
    /// Keepalive ping period; zero disables pings
    pub ping_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            send_queue: 256,
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Parser, Debug)]
#[command(name = "signaling-relay", about = "Room-based WebSocket signaling relay")]
pub struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Per-connection outbound queue length.
    #[arg(long, default_value_t = 256)]
    pub send_queue: usize,

    /// Timeout for a single WebSocket write, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub write_timeout_ms: u64,

    /// Interval between keepalive pings, in seconds (0 disables).
    #[arg(long, default_value_t = 30)]
    pub ping_interval_secs: u64,
}

impl Args {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            send_queue: self.send_queue,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
        }
    }
}
