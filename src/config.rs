use crate::error::{PolyportError, Result};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Application identity
    pub app: AppConfig,
    /// HTTP / WebSocket server configuration
    pub http: HttpServerConfig,
    /// RPC server configuration
    pub rpc: RpcServerConfig,
    /// WebSocket session configuration
    pub websocket: WebSocketConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name reported by the status endpoint
    pub name: String,
    /// Service version reported by the status endpoint
    pub version: String,
    /// Debug mode
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Port for the HTTP server (default: 8000)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = any origin)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Port for the RPC server (default: 50051)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Delay between heartbeat probes
    pub heartbeat_interval: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let debug = get_env_or("DEBUG", "true").to_lowercase() == "true";
        let default_level = if debug { "debug" } else { "info" };

        Ok(Config {
            app: AppConfig {
                name: get_env_or("APP_NAME", "polyport"),
                version: get_env_or("APP_VERSION", "1.0.0"),
                debug,
            },
            http: HttpServerConfig {
                port: get_env_or("HTTP_PORT", "8000").parse().map_err(|_| {
                    PolyportError::InvalidConfig("HTTP_PORT must be a valid port number".into())
                })?,
                host: get_env_or("HTTP_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            rpc: RpcServerConfig {
                port: get_env_or("RPC_PORT", "50051").parse().map_err(|_| {
                    PolyportError::InvalidConfig("RPC_PORT must be a valid port number".into())
                })?,
                host: get_env_or("RPC_HOST", "0.0.0.0"),
            },
            websocket: WebSocketConfig {
                heartbeat_interval: parse_heartbeat_interval()?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", default_level),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Get the RPC server address
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc.host, self.rpc.port)
    }
}

fn parse_heartbeat_interval() -> Result<Duration> {
    let secs: u64 = get_env_or("WS_HEARTBEAT_INTERVAL", "30")
        .parse()
        .map_err(|_| {
            PolyportError::InvalidConfig(
                "WS_HEARTBEAT_INTERVAL must be a whole number of seconds".into(),
            )
        })?;

    if secs == 0 {
        return Err(PolyportError::InvalidConfig(
            "WS_HEARTBEAT_INTERVAL must be greater than zero".into(),
        ));
    }

    Ok(Duration::from_secs(secs))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
