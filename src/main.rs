use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use deliverd::cli::Workspace;
use deliverd::Result;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deliverd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autonomous feature delivery engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Repository root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: <root>/deliverd/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report errors on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive every pending feature to completion
    Run,

    /// Advance exactly one phase, then exit
    Step,

    /// Approve the feature waiting at APPROVE
    Approve,

    /// Show engine phase, current feature and progress
    Status {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// List pending features in execution order
    Pending,

    /// Initialize deliverd in the repository
    Init {
        /// Rewrite the config even if it exists
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = deliverd::logging::init(deliverd::logging::level_for(cli.verbose, cli.quiet)) {
        eprintln!("{}", format!("Warning: {}", e).yellow());
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to create tokio runtime: {}", e).red());
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(deliverd::error::exit_code(&e));
    }
}

async fn run_async(cli: Cli) -> Result<()> {
    let workspace = Workspace::resolve(cli.root, cli.config)?;

    match cli.command {
        Commands::Run => {
            println!("{}", "🤖 Delivering pending features...".cyan());
            deliverd::cli::run::run(&workspace).await?;
        }
        Commands::Step => {
            deliverd::cli::step::run(&workspace).await?;
        }
        Commands::Approve => {
            deliverd::cli::approve::run(&workspace).await?;
        }
        Commands::Status { json } => {
            deliverd::cli::status::run(&workspace, json).await?;
        }
        Commands::Pending => {
            deliverd::cli::pending::run(&workspace).await?;
        }
        Commands::Init { force } => {
            if force {
                println!("{}", "🔄 Re-initializing deliverd...".cyan());
            } else {
                println!("{}", "🚀 Initializing deliverd...".cyan());
            }
            deliverd::cli::init::run(&workspace, force).await?;
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "deliverd", &mut io::stdout());
        }
    }

    Ok(())
}
