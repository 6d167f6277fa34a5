use anyhow::Context;
use clap::Parser;
use rift_render::config::Config;
use rift_render::server::StubServer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "rift-render",
    version,
    about = "HTTP stub server with proxying and response templating"
)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "RIFT_PORT")]
    port: Option<u16>,

    /// YAML configuration file
    #[arg(short, long, env = "RIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory body files are read from
    #[arg(long, env = "RIFT_ROOT_DIR")]
    root_dir: Option<PathBuf>,

    /// Forward the caller's Host header to proxy targets
    #[arg(long)]
    preserve_host_header: bool,

    /// Host header sent to proxy targets
    #[arg(long)]
    proxy_host_header: Option<String>,

    /// Forward proxy (host:port) to reach proxy targets through
    #[arg(long, env = "RIFT_PROXY_VIA")]
    proxy_via: Option<String>,

    /// Template every response definition
    #[arg(long, conflicts_with = "local_response_templating")]
    global_response_templating: bool,

    /// Template only definitions listing the response-template transformer
    #[arg(long)]
    local_response_templating: bool,

    /// Maximum number of compiled templates to cache (0 disables caching)
    #[arg(long, allow_negative_numbers = true)]
    max_template_cache_entries: Option<i64>,

    /// Comma-separated key patterns systemValue may read
    #[arg(long, value_delimiter = ',')]
    permitted_system_keys: Vec<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Flags take precedence over the configuration file.
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(root) = &self.root_dir {
            config.files_root = root.clone();
        }
        if self.preserve_host_header {
            config.proxy.preserve_host_header = true;
        }
        if let Some(host) = &self.proxy_host_header {
            config.proxy.host_header = Some(host.clone());
        }
        if let Some(via) = &self.proxy_via {
            config.proxy.proxy_via = Some(via.clone());
        }
        if self.global_response_templating {
            config.templating.global = true;
        }
        if self.local_response_templating {
            config.templating.global = false;
        }
        if let Some(max) = self.max_template_cache_entries {
            config.templating.max_cache_entries = Some(max);
        }
        if !self.permitted_system_keys.is_empty() {
            config.templating.permitted_system_keys = self.permitted_system_keys.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    info!("rift-render v{} starting", env!("CARGO_PKG_VERSION"));

    let addr = config.listen.socket_addr()?;
    let server = StubServer::from_config(&config)?;
    let handle = server.bind(addr).await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    handle.shutdown().await;
    Ok(())
}
