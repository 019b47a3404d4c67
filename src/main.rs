//! onnxedit - ONNX graph editor server and offline editing tools

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use onnxedit_core::{BindMode, EditFailurePolicy, ServerConfig};
use onnxedit_editor::EditSession;
use onnxedit_gateway::start_server;
use onnxedit_graph::Graph;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "onnxedit", about = "Edit ONNX graphs from a browser or the command line")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailureMode {
    Reject,
    Acknowledge,
}

impl From<FailureMode> for EditFailurePolicy {
    fn from(mode: FailureMode) -> Self {
        match mode {
            FailureMode::Reject => EditFailurePolicy::Reject,
            FailureMode::Acknowledge => EditFailurePolicy::Acknowledge,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server for the browser editor
    Serve {
        /// TOML config file (default: $ONNXEDIT_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        port: Option<u16>,
        /// loopback or lan
        #[arg(short, long)]
        bind: Option<String>,
        /// Directory with the GUI assets
        #[arg(long)]
        static_dir: Option<PathBuf>,
        /// How /model/edit answers a failed edit
        #[arg(long, value_enum)]
        edit_failures: Option<FailureMode>,
        #[arg(long)]
        default_session: Option<String>,
    },
    /// Print the node list as reconciliation entries
    Nodes { model: PathBuf },
    /// Apply a JSON array of edit requests and write the result
    Edit {
        model: PathBuf,
        #[arg(short, long)]
        script: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Remove nodes and tensors that do not reach a graph output
    Cleanup {
        model: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Evaluate constant subgraphs ahead of time
    Fold {
        model: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show version
    Version,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "onnxedit=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve {
            config,
            port,
            bind,
            static_dir,
            edit_failures,
            default_session,
        } => {
            let mut config = match config.or_else(|| std::env::var_os("ONNXEDIT_CONFIG").map(PathBuf::from)) {
                Some(path) => ServerConfig::load(&path),
                None => ServerConfig::default(),
            };
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = BindMode::parse(&bind);
            }
            if static_dir.is_some() {
                config.static_dir = static_dir;
            }
            if let Some(mode) = edit_failures {
                config.edit_failures = mode.into();
            }
            if let Some(session) = default_session {
                config.default_session = session;
            }
            start_server(config).await?;
        }

        Commands::Nodes { model } => {
            let session = open_session(&model)?;
            println!("{}", serde_json::to_string_pretty(&session.describe())?);
        }

        Commands::Edit {
            model,
            script,
            output,
        } => {
            let mut session = open_session(&model)?;
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let edits: Vec<serde_json::Value> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array of edits", script.display()))?;
            let total = edits.len();
            let mut skipped = 0;
            for (idx, edit) in edits.into_iter().enumerate() {
                let outcome = session
                    .apply_json(edit)
                    .with_context(|| format!("edit #{idx} failed"))?;
                if outcome.is_applied() {
                    info!(idx, "edit applied");
                } else {
                    skipped += 1;
                    warn!(idx, ?outcome, "edit skipped");
                }
            }
            info!(applied = total - skipped, skipped, "edit script done");
            save(&session, &output)?;
        }

        Commands::Cleanup { model, output } => {
            let mut session = open_session(&model)?;
            let report = session.cleanup()?;
            info!(
                removed_nodes = report.removed_nodes,
                removed_tensors = report.removed_tensors,
                "cleanup done"
            );
            save(&session, &output)?;
        }

        Commands::Fold { model, output } => {
            let mut session = open_session(&model)?;
            let report = session.fold_constants()?;
            info!(folded = report.folded_nodes, skipped = ?report.skipped_nodes, "fold done");
            save(&session, &output)?;
        }

        Commands::Version => {
            println!("onnxedit v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn open_session(path: &Path) -> anyhow::Result<EditSession> {
    let graph = Graph::from_file(path).with_context(|| format!("loading {}", path.display()))?;
    info!(nodes = graph.node_count(), "opened {}", path.display());
    Ok(EditSession::new(graph))
}

fn save(session: &EditSession, path: &Path) -> anyhow::Result<()> {
    session
        .graph()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}
