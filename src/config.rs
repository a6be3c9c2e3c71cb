use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,

    /// Grace period when stopping containers
    pub stop_timeout: Duration,

    /// Timeout for Docker Hub API requests
    pub hub_timeout: Duration,

    /// Page size for Docker Hub tag listings
    pub hub_page_size: u32,

    /// Default number of log lines when tailing container logs
    pub log_tail: u64,

    // Storage configuration
    pub metadata_db_path: String,
    pub volume_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| "/root".to_string());

        Self {
            host: env::var("HOST")
                .ok()
                .and_then(|s| IpAddr::from_str(&s).ok())
                .unwrap_or_else(|| IpAddr::from_str("0.0.0.0").unwrap()),
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            stop_timeout: Duration::from_secs(
                env::var("STOP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            hub_timeout: Duration::from_secs(
                env::var("HUB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            hub_page_size: env::var("HUB_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
            log_tail: env::var("LOG_TAIL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),

            // Storage
            metadata_db_path: env::var("METADATA_DB_PATH")
                .unwrap_or_else(|_| format!("{}/.ldb-api/instances.db", home)),
            volume_root: env::var("VOLUME_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(format!("{}/.ldb-api/volumes", home))),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_combines_host_and_port() {
        let mut config = Config::from_env();
        config.host = IpAddr::from_str("127.0.0.1").unwrap();
        config.port = 9000;
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
    }
}
