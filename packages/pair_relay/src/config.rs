use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

// =============================================================================
// File config (figment-deserialized from defaults / pair_relay.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   pair_relay.toml: [server]
//                    port = 9000
//
//   env var:         PAIR_SERVER__PORT=9000   (double underscore = nesting)
//
//   CLI flag:        --port 9000              (wins over both)

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pair_relay.toml";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RelayFileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Server knobs (lives under `[server]` in the config file).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Envelopes queued per connection before senders wait
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_outbound_buffer() -> usize {
    64
}

/// Build a figment that layers: defaults → config file → PAIR_* env vars.
///
/// A missing config file is not an error; its layer is simply empty.
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(RelayFileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("PAIR_").split("__"))
}

// =============================================================================
// Runtime config (derived from RelayFileConfig plus CLI overrides)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    pub outbound_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], default_port()).into(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

impl RelayConfig {
    /// Resolve the runtime config, letting CLI values override the file.
    pub fn from_file(
        fc: &RelayFileConfig,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<Self> {
        let host = host.unwrap_or(&fc.server.host);
        let port = port.unwrap_or(fc.server.port);
        let bind_addr = format!("{}:{}", host, port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}:{}", host, port))?;

        Ok(Self {
            bind_addr,
            outbound_buffer: fc.server.outbound_buffer.max(1),
        })
    }

    /// Load the file/env layers from `config_path` and apply CLI overrides.
    pub fn load(config_path: &Path, host: Option<&str>, port: Option<u16>) -> Result<Self> {
        let fc: RelayFileConfig = load_config(config_path)
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        Self::from_file(&fc, host, port)
    }
}
