//! danm-admission - TLS admission webhook for tenant network definitions

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use danm_admission::admission::{admission_router, WebhookState};
use danm_admission::client::KubeDanmClient;

/// Admission and mutation webhook for multi-tenant container networking
#[derive(Parser, Debug)]
#[command(name = "danm-admission", version, about, long_about = None)]
struct Cli {
    /// Listen address of the TLS webhook server
    #[arg(long, default_value = "0.0.0.0:8443")]
    listen_addr: SocketAddr,

    /// Path to the serving certificate
    #[arg(long, env = "TLS_CERT_PATH", default_value = "/etc/webhook/certs/tls.crt")]
    tls_cert: PathBuf,

    /// Path to the serving key
    #[arg(long, env = "TLS_KEY_PATH", default_value = "/etc/webhook/certs/tls.key")]
    tls_key: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install crypto provider");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let state = Arc::new(WebhookState::new(Arc::new(KubeDanmClient::new(client))));
    let router = admission_router(state);

    let tls_config =
        axum_server::tls_rustls::RustlsConfig::from_pem_file(&cli.tls_cert, &cli.tls_key)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load TLS material: {}", e))?;

    tracing::info!(addr = %cli.listen_addr, "Admission webhook listening");
    axum_server::bind_rustls(cli.listen_addr, tls_config)
        .serve(router.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Webhook server error: {}", e))?;

    Ok(())
}
