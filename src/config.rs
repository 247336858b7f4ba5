//! Relay process configuration.

use std::time::Duration;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 20;

/// Real-time location relay.
#[derive(Clone, Debug, Parser)]
#[command(name = "location-relay", version)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "LOCATION_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on. `0` picks a free port.
    #[arg(long, env = "LOCATION_RELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Seconds between pings sent to each client.
    #[arg(
        long,
        env = "LOCATION_RELAY_HEARTBEAT_INTERVAL",
        default_value_t = DEFAULT_HEARTBEAT_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub heartbeat_interval_secs: u64,
    /// Extra seconds of silence tolerated after a missed ping before the
    /// client is dropped.
    #[arg(
        long,
        env = "LOCATION_RELAY_HEARTBEAT_TIMEOUT",
        default_value_t = DEFAULT_HEARTBEAT_TIMEOUT_SECS
    )]
    pub heartbeat_timeout_secs: u64,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            interval: Duration::from_secs(self.heartbeat_interval_secs.max(1)),
            timeout: Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            heartbeat_timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
        }
    }
}

/// Liveness policy for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Heartbeat {
    /// How often a ping goes out.
    pub interval: Duration,
    /// Grace on top of `interval` before a silent peer counts as gone.
    pub timeout: Duration,
}

impl Heartbeat {
    /// Longest a connection may go without any inbound frame.
    pub fn idle_deadline(&self) -> Duration {
        self.interval + self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_9090() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.addr(), "0.0.0.0:9090");
    }

    #[test]
    fn parse_flags() {
        let cfg = ServerConfig::parse_from(["location-relay", "--host", "127.0.0.1", "--port", "0"]);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_heartbeat() {
        let heartbeat = ServerConfig::default().heartbeat();
        assert_eq!(heartbeat.interval, Duration::from_secs(25));
        assert_eq!(heartbeat.idle_deadline(), Duration::from_secs(45));
    }

    #[test]
    fn zero_heartbeat_interval_is_rejected() {
        let parsed = ServerConfig::try_parse_from([
            "location-relay",
            "--heartbeat-interval-secs",
            "0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        ServerConfig::command().debug_assert();
    }
}
