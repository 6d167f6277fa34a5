//! Configuration types for the Rift stub server.

mod delays;
mod listen;
mod proxy;
mod templating;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use delays::DelaySettings;
pub use listen::ListenConfig;
pub use proxy::ProxySettings;
pub use templating::TemplatingConfig;

use crate::stub::StubMapping;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub templating: TemplatingConfig,
    #[serde(default)]
    pub delays: DelaySettings,
    /// Directory `bodyFileName` is resolved against.
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,
    #[serde(default)]
    pub stubs: Vec<StubMapping>,
}

fn default_files_root() -> PathBuf {
    PathBuf::from("__files")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            proxy: ProxySettings::default(),
            templating: TemplatingConfig::default(),
            delays: DelaySettings::default(),
            files_root: default_files_root(),
            stubs: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(max) = self.templating.max_cache_entries {
            if max < 0 {
                anyhow::bail!(
                    "templating.max_cache_entries must not be negative (got {max}). \
                     Omit it for an unbounded cache or use 0 to disable caching"
                );
            }
        }

        if self.proxy.connect_timeout_ms == 0 || self.proxy.read_timeout_ms == 0 {
            anyhow::bail!("proxy.connect_timeout_ms and proxy.read_timeout_ms must be positive");
        }

        if let Some(host) = &self.proxy.host_header {
            if host.trim().is_empty() {
                anyhow::bail!("proxy.host_header must not be empty when set");
            }
        }

        self.proxy.forward_proxy()?;

        for (index, stub) in self.stubs.iter().enumerate() {
            let label = stub.id.clone().unwrap_or_else(|| format!("#{index}"));
            let response = &stub.response;
            if !(100..=999).contains(&response.status) {
                anyhow::bail!("Stub {label}: invalid status code {}", response.status);
            }
            let body_sources = [
                response.body.is_some(),
                response.base64_body.is_some(),
                response.body_file_name.is_some(),
            ]
            .iter()
            .filter(|set| **set)
            .count();
            if body_sources > 1 {
                anyhow::bail!(
                    "Stub {label}: only one of body, base64Body and bodyFileName may be set"
                );
            }
            if let Some(dribble) = &response.chunked_dribble_delay {
                if dribble.number_of_chunks == 0 {
                    anyhow::bail!("Stub {label}: chunkedDribbleDelay.numberOfChunks must be > 0");
                }
            }
        }

        Ok(())
    }
}
