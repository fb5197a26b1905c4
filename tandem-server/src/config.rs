use std::{
    env,
    net::{IpAddr, Ipv6Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use crate::{ServerError, ServerResult, DEFAULT_PORT};

const PORT: &str = "TANDEM_SERVER_PORT";
const BIND_ADDRESS: &str = "TANDEM_BIND_ADDRESS";
const WS_PATH: &str = "TANDEM_WS_PATH";
const OUTBOX_CAPACITY: &str = "TANDEM_OUTBOX_CAPACITY";
const PING_INTERVAL: &str = "TANDEM_PING_INTERVAL_SECS";
const IDLE_TIMEOUT: &str = "TANDEM_IDLE_TIMEOUT_SECS";

/// Settings for the relay server, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    /// The only path WebSocket upgrades are accepted on
    pub ws_path: String,
    /// How many frames may wait for a slow connection before new ones are dropped
    pub outbox_capacity: usize,
    /// `None` disables heartbeats, and with them the idle timeout
    pub ping_interval: Option<Duration>,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv6Addr::UNSPECIFIED.into(),
            port: DEFAULT_PORT,
            ws_path: "/ws/room".to_string(),
            outbox_capacity: 256,
            ping_interval: Some(Duration::from_secs(30)),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ServerConfig {
    /// Reads the config from `TANDEM_*` environment variables.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from a variable lookup, using defaults for anything missing.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ws_path = lookup(WS_PATH).unwrap_or(defaults.ws_path);
        if !ws_path.starts_with('/') {
            return Err(invalid(WS_PATH, ws_path));
        }

        let outbox_capacity = parse(&lookup, OUTBOX_CAPACITY)?.unwrap_or(defaults.outbox_capacity);
        if outbox_capacity == 0 {
            return Err(invalid(OUTBOX_CAPACITY, outbox_capacity.to_string()));
        }

        let ping_interval = match parse::<u64, _>(&lookup, PING_INTERVAL)? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.ping_interval,
        };

        let idle_timeout = parse::<u64, _>(&lookup, IDLE_TIMEOUT)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_timeout);

        if idle_timeout.is_zero() {
            return Err(invalid(IDLE_TIMEOUT, "0".to_string()));
        }

        Ok(Self {
            bind_address: parse(&lookup, BIND_ADDRESS)?.unwrap_or(defaults.bind_address),
            port: parse(&lookup, PORT)?.unwrap_or(defaults.port),
            ws_path,
            outbox_capacity,
            ping_interval,
            idle_timeout,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        (self.bind_address, self.port).into()
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> ServerResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };

    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| invalid(key, value))
}

fn invalid(key: &'static str, value: String) -> ServerError {
    ServerError::InvalidConfig { key, value }
}
