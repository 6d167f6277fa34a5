//! Upstream proxy settings.

use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxySettings {
    /// Forward the caller's Host header unchanged instead of rewriting it.
    #[serde(default)]
    pub preserve_host_header: bool,

    /// Host header value sent upstream when the caller's is not preserved.
    /// Defaults to the authority of the stub's proxy base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_header: Option<String>,

    /// Forward proxy (`host:port`) every upstream call goes through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_via: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Accept any certificate presented by an HTTPS target.
    #[serde(default = "default_trust_all_certificates")]
    pub trust_all_certificates: bool,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            preserve_host_header: false,
            host_header: None,
            proxy_via: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            trust_all_certificates: default_trust_all_certificates(),
            max_idle_per_host: default_max_idle_per_host(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl ProxySettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// The `proxy_via` address as an `http://host:port` URI.
    pub fn forward_proxy(&self) -> Result<Option<Uri>, anyhow::Error> {
        let Some(via) = self.proxy_via.as_deref() else {
            return Ok(None);
        };
        let via = via.trim();
        let (host, port) = via
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("proxy.proxy_via must be host:port (got '{via}')"))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            anyhow::bail!("proxy.proxy_via must be host:port (got '{via}')");
        }
        let uri: Uri = format!("http://{via}")
            .parse()
            .map_err(|e| anyhow::anyhow!("proxy.proxy_via '{via}' is not a valid address: {e}"))?;
        Ok(Some(uri))
    }
}

fn default_connect_timeout_ms() -> u64 {
    1_000
}

fn default_read_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

fn default_trust_all_certificates() -> bool {
    true
}

fn default_max_idle_per_host() -> usize {
    100
}

fn default_idle_timeout() -> u64 {
    90
}
