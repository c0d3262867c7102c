use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use node_federation::backend::GraphqlFederationClient;
use node_federation::config::FederationConfig;
use node_federation::discovery::SyncOutcome;
use node_federation::host::{HttpWindowHost, WindowHost};
use node_federation::launcher::{BackendRunSurface, LaunchOutcome, RunKind, RunLauncher, RunReference};
use node_federation::nodes::NodeRegistry;
use node_federation::{Daemon, Federation};

/// nodefed - federate agent/team catalogs across nodes and hand off runs
#[derive(Parser)]
#[command(name = "nodefed", version, about)]
struct Cli {
    /// Port for the host API (overrides config)
    #[arg(long, env = "NODEFED_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the federation host (default)
    Serve,
    /// Run one discovery reconciliation and print the nodes
    Sync,
    /// Load and print the federated catalog
    Catalog,
    /// Start a run of an agent or team definition
    Launch {
        /// Definition kind
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Node that hosts the definition
        #[arg(long)]
        home_node: String,
        /// Definition id on the home node
        #[arg(long)]
        definition: String,
        /// Display name of the definition
        #[arg(long)]
        name: String,
        /// Node the launching window is bound to
        #[arg(long)]
        source_node: Option<String>,
        /// Host API base URL (defaults to the local host API)
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Agent,
    Team,
}

impl From<KindArg> for RunKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Agent => Self::Agent,
            KindArg::Team => Self::Team,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,node_federation=info",
        1 => "info,node_federation=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = FederationConfig::load()?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => Daemon::new(config)?.run().await?,
        Command::Sync => cmd_sync(&config).await?,
        Command::Catalog => cmd_catalog(&config).await?,
        Command::Launch {
            kind,
            home_node,
            definition,
            name,
            source_node,
            host,
        } => {
            let reference = RunReference {
                home_node_id: home_node,
                definition_id: definition,
                name,
            };
            cmd_launch(&config, kind.into(), &reference, source_node, host).await?;
        }
    }
    Ok(())
}

async fn cmd_sync(config: &FederationConfig) -> anyhow::Result<()> {
    let federation = Federation::from_config(config)?;

    match federation.discovery.sync_once().await? {
        SyncOutcome::Completed(report) => {
            println!(
                "discovered {} peer(s), {} changed, {} pruned",
                report.peers_reported,
                report.nodes_changed,
                report.pruned_node_ids.len()
            );
        }
        SyncOutcome::BackendNotReady => {
            let detail = federation.discovery.last_error().await.unwrap_or_default();
            anyhow::bail!("{detail}");
        }
        SyncOutcome::Skipped => println!("sync already in progress"),
    }

    for node in federation.registry.nodes().await {
        let source = format!("{:?}", node.registration_source).to_lowercase();
        println!(
            "{:<24} {:<24} {source:<10} {}",
            node.id, node.name, node.base_url
        );
    }
    Ok(())
}

async fn cmd_catalog(config: &FederationConfig) -> anyhow::Result<()> {
    let federation = Federation::from_config(config)?;

    // Pick up discovered peers first so their scopes are included
    if let Err(e) = federation.discovery.sync_once().await {
        tracing::warn!(error = %e, "discovery failed, listing known nodes only");
    }

    let snapshot = federation.catalog.load_catalog().await?;
    println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    Ok(())
}

async fn cmd_launch(
    config: &FederationConfig,
    kind: RunKind,
    reference: &RunReference,
    source_node: Option<String>,
    host: Option<String>,
) -> anyhow::Result<()> {
    let host_url = host.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.api_server.port));
    let window_host: Arc<dyn WindowHost> = Arc::new(HttpWindowHost::new(&host_url)?);
    let local = Arc::new(BackendRunSurface::new(GraphqlFederationClient::new(
        &config.backend_url,
    )));

    let source = source_node.or_else(|| Some(config.source_node_id().to_string()));
    let launcher = RunLauncher::new(source, local, Some(window_host));

    match launcher.launch(kind, reference).await? {
        LaunchOutcome::Local { definition_id } => {
            println!("started local {kind} run of {definition_id}");
        }
        LaunchOutcome::Remote {
            command_id,
            window_id,
            delivered,
            ..
        } => {
            let state = if delivered { "delivered" } else { "queued" };
            println!(
                "handed {kind} run to {} ({state}, command {command_id}, window {})",
                reference.home_node_id,
                window_id.unwrap_or_default()
            );
        }
    }
    Ok(())
}
