use std::env;
use std::net::SocketAddr;

/// How the interception server is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
    /// Requests are resolved by calling the server directly
    InProcess,
    /// Requests arrive over a loopback socket bound to `addr`
    Loopback { addr: SocketAddr },
}

#[derive(Debug, Clone)]
pub struct InterceptConfig {
    pub mode: InterceptMode,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            mode: InterceptMode::InProcess,
        }
    }
}

impl InterceptConfig {
    pub fn in_process() -> Self {
        Self::default()
    }

    /// Loopback mode on an ephemeral port
    pub fn loopback() -> Self {
        Self {
            mode: InterceptMode::Loopback {
                addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            },
        }
    }

    pub fn loopback_on(addr: SocketAddr) -> Self {
        Self {
            mode: InterceptMode::Loopback { addr },
        }
    }
}

/// Settings for the `mockwire` binary
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to serve the base handlers on
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let addr = match env::var("MOCKWIRE_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid MOCKWIRE_ADDR '{}': {}", raw, e))?,
            Err(_) => {
                let port: u16 = env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(4010);
                SocketAddr::from(([127, 0, 0, 1], port))
            }
        };

        Ok(Self { addr })
    }

    pub fn intercept(&self) -> InterceptConfig {
        InterceptConfig::loopback_on(self.addr)
    }
}
