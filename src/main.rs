use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod flags;
mod priming;
mod registry;
mod startup;
mod supervisor;
mod template;

use flags::FeatureFlags;
use priming::{BackendConfig, DEFAULT_ETCD_AUTHORITY, DEFAULT_ETCD_SCHEME};
use startup::{Sequencer, StartupConfig, StartupPlan};

/// Startup orchestrator for the meshnode network-node container
#[derive(Parser)]
#[command(name = "meshnode-init")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the startup plan as JSON and exit without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Hostname substituted into configuration templates
    #[arg(long, env = "HOSTNAME")]
    node_hostname: Option<String>,

    /// Supervision tree scanned by the process supervisor
    #[arg(long, env = "MESHNODE_SERVICE_DIR", default_value = "/etc/service")]
    service_dir: PathBuf,

    /// confd configuration directory (holds templates/ and conf.d/)
    #[arg(long, env = "MESHNODE_CONFD_DIR", default_value = "/etc/meshnode/confd")]
    confd_dir: PathBuf,

    /// Templating agent binary
    #[arg(long, default_value = "confd")]
    confd_bin: PathBuf,

    /// Process supervisor binary receiving the terminal exec
    #[arg(long, default_value = "runsvdir")]
    supervisor_bin: PathBuf,

    /// etcd endpoint scheme
    #[arg(long, env = "ETCD_SCHEME", default_value = DEFAULT_ETCD_SCHEME)]
    etcd_scheme: String,

    /// etcd authority (host:port)
    #[arg(long, env = "ETCD_AUTHORITY", default_value = DEFAULT_ETCD_AUTHORITY)]
    etcd_authority: String,

    /// Client key file for etcd TLS
    #[arg(long, env = "ETCD_KEY_FILE")]
    etcd_key_file: Option<PathBuf>,

    /// Client certificate file for etcd TLS
    #[arg(long, env = "ETCD_CERT_FILE")]
    etcd_cert_file: Option<PathBuf>,

    /// CA certificate bundle for etcd TLS
    #[arg(long, env = "ETCD_CA_CERT_FILE")]
    etcd_ca_cert_file: Option<PathBuf>,
}

// The sequence is strictly sequential; the only suspension points are
// the blocking confd invocations.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // The one place the feature-flag environment is read; the resolved
    // value is threaded through everything below.
    let flags = FeatureFlags::resolve();

    if cli.dry_run {
        let plan = StartupPlan::new(flags);
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let config = StartupConfig {
        flags,
        hostname: cli.node_hostname,
        service_dir: cli.service_dir,
        confd_dir: cli.confd_dir,
        confd_bin: cli.confd_bin,
        supervisor_bin: cli.supervisor_bin,
        backend: BackendConfig {
            scheme: cli.etcd_scheme,
            authority: cli.etcd_authority,
            client_key: cli.etcd_key_file,
            client_cert: cli.etcd_cert_file,
            client_ca: cli.etcd_ca_cert_file,
        },
    };

    let mut seq = Sequencer::new(config);
    let handoff = match seq.run().await {
        Ok(handoff) => handoff,
        Err(e) => {
            return Err(e.context(format!("startup aborted after phase {}", seq.phase())));
        }
    };

    info!("Startup complete, replacing process image with supervisor");

    // Terminal transition: exec only returns on failure.
    let err = handoff.exec();
    Err(err).context("failed to exec process supervisor")
}
