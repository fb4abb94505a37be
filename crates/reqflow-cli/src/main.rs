mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    comment::CommentSubcommand, config::ConfigSubcommand, stats::StatsSubcommand,
    ticket::TicketSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reqflow",
    about = "Request tracker: tickets, assignments, ETAs and per-account statistics",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .reqflow/)
    #[arg(long, global = true, env = "REQFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Act as this user (NTID from the project's users.yaml)
    #[arg(long = "as", global = true, env = "REQFLOW_USER", value_name = "NTID")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize reqflow in the current project
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Create, move and inspect tickets
    Ticket {
        #[command(subcommand)]
        subcommand: TicketSubcommand,
    },

    /// Add and list comments on a ticket
    Comment {
        #[command(subcommand)]
        subcommand: CommentSubcommand,
    },

    /// Per-account and per-user ticket statistics
    Stats {
        #[command(subcommand)]
        subcommand: StatsSubcommand,
    },

    /// Tickets approaching or past their ETA
    Alerts {
        /// Minutes before the ETA at which a ticket counts as approaching
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Inspect and validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let as_user = cli.as_user.as_deref();

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Ticket { subcommand } => cmd::ticket::run(&root, as_user, subcommand, cli.json),
        Commands::Comment { subcommand } => {
            cmd::comment::run(&root, as_user, subcommand, cli.json)
        }
        Commands::Stats { subcommand } => cmd::stats::run(&root, as_user, subcommand, cli.json),
        Commands::Alerts { threshold } => cmd::alerts::run(&root, as_user, threshold, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
