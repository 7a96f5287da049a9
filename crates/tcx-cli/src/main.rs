use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tcx")]
#[command(about = "Single-scope trading session CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> account -> session overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Replay a CSV bar file through a session on the paper backend
    Run {
        /// Config paths in merge order
        #[arg(long = "config", required = true, num_args = 1..)]
        config_paths: Vec<String>,

        /// Bars CSV: ts_close_utc,open,high,low,close,volume
        #[arg(long)]
        bars: String,

        /// Per-trade fee charged by the paper backend, in price units
        #[arg(long, default_value_t = 0.0)]
        fee: f64,

        /// Refuse to run when the config carries keys nothing reads
        #[arg(long, default_value_t = false)]
        strict_keys: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Silent when the file is absent.
    dotenvy::from_filename(".env.local").ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = tcx_config::load_layered_yaml(paths.as_slice())?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Run {
            config_paths,
            bars,
            fee,
            strict_keys,
        } => {
            let report = commands::run::run_replay(commands::run::ReplayArgs {
                config_paths,
                bars_path: bars,
                fee,
                strict_keys,
            })
            .await?;
            println!("config_hash={}", report.config_hash);
            println!("{}", serde_json::to_string_pretty(&report.run)?);
        }
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
