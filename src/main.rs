use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sshttp::config::{load_config, validation::validate_config, ProxyConfig};
use sshttp::credentials::CredentialStore;
use sshttp::http::HttpServer;
use sshttp::lifecycle::{spawn_signal_handlers, Shutdown};
use sshttp::observability::metrics;
use sshttp::transport::SecureTransport;

#[derive(Parser)]
#[command(name = "sshttp")]
#[command(about = "Forward HTTP proxy that carries every upstream request over SSH", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode.
    #[arg(short, long)]
    verbose: bool,

    /// Address the proxy will listen on.
    #[arg(long = "proxy.listen-addr")]
    listen_addr: Option<String>,

    /// Optional address of another instance of this proxy when cascading
    /// usage is required.
    #[arg(long = "next-proxy.addr")]
    next_proxy_addr: Option<String>,

    /// Address the service will listen on for metrics requests about itself.
    #[arg(long = "metrics.listen-addr")]
    metrics_addr: Option<String>,

    /// Username used for connecting via ssh.
    #[arg(long = "ssh.user")]
    ssh_user: Option<String>,

    /// Private key file used for connecting via ssh.
    #[arg(long = "ssh.key-file")]
    ssh_key_file: Option<String>,

    /// Known hosts file used for connecting via ssh.
    #[arg(long = "ssh.known-hosts-file")]
    ssh_known_hosts_file: Option<String>,

    /// Port used for connecting via ssh.
    #[arg(long = "ssh.port")]
    ssh_port: Option<u16>,
}

impl Cli {
    /// Assemble the effective configuration: file first (if given), then
    /// flag overrides, then a final semantic validation pass.
    fn into_config(self) -> Result<(ProxyConfig, bool), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(addr) = self.listen_addr {
            config.listener.bind_address = addr;
        }
        if let Some(addr) = self.next_proxy_addr {
            config.ssh.next_proxy_addr = Some(addr);
        }
        if let Some(addr) = self.metrics_addr {
            config.observability.metrics_address = Some(addr);
        }
        if let Some(user) = self.ssh_user {
            config.ssh.user = user;
        }
        if let Some(path) = self.ssh_key_file {
            config.ssh.key_file = path;
        }
        if let Some(path) = self.ssh_known_hosts_file {
            config.ssh.known_hosts_file = path;
        }
        if let Some(port) = self.ssh_port {
            config.ssh.port = port;
        }

        if let Err(errors) = validate_config(&config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(format!("invalid configuration: {joined}").into());
        }

        Ok((config, self.verbose))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, verbose) = cli.into_config()?;

    let default_filter = if verbose {
        "sshttp=debug,tower_http=debug".to_string()
    } else {
        format!("sshttp={}", config.observability.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sshttp v0.1.0 starting");

    if let Some(relay) = &config.ssh.next_proxy_addr {
        tracing::info!(
            next_proxy_addr = %relay,
            "running in cascading mode: will ssh to the relay and use the http proxy there"
        );
    }

    let credentials = Arc::new(CredentialStore::load(
        Path::new(&config.ssh.key_file),
        Path::new(&config.ssh.known_hosts_file),
    )?);

    if let Some(addr) = &config.observability.metrics_address {
        match addr.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(metrics_address = %addr, "failed to parse metrics address");
            }
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handlers(credentials.clone(), shutdown.clone());

    let transport = Arc::new(SecureTransport::new(config.ssh.clone(), credentials));
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let server = HttpServer::new(config, transport);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
