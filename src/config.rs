use std::{env, io};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_SCHEDULER_PORT: u16 = 8765;
const DEFAULT_PS_PORT: u16 = 8766;
const DEFAULT_FUNCTION_ADDR: &str = "127.0.0.1:8080";

/// Where the node listens and where it reaches the serverless functions.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub host: String,
    pub scheduler_port: u16,
    pub ps_port: u16,
    pub function_addr: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            scheduler_port: DEFAULT_SCHEDULER_PORT,
            ps_port: DEFAULT_PS_PORT,
            function_addr: DEFAULT_FUNCTION_ADDR.to_string(),
        }
    }
}

impl NodeConfig {
    /// Reads `HOST`, `SCHEDULER_PORT`, `PS_PORT` and `FUNCTION_ADDR`.
    pub fn from_env() -> io::Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(addr) = env::var("FUNCTION_ADDR") {
            config.function_addr = addr;
        }
        config.scheduler_port = port("SCHEDULER_PORT", config.scheduler_port)?;
        config.ps_port = port("PS_PORT", config.ps_port)?;

        Ok(config)
    }

    pub fn scheduler_addr(&self) -> String {
        format!("{}:{}", self.host, self.scheduler_port)
    }

    pub fn ps_addr(&self) -> String {
        format!("{}:{}", self.host, self.ps_port)
    }
}

fn port(key: &str, default: u16) -> io::Result<u16> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid port in {key}: {raw:?}"),
            )
        }),
        Err(_) => Ok(default),
    }
}
