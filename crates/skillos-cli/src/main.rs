use clap::{CommandFactory, Parser, Subcommand};
use skillos_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "skillos-cli", version, about = "SkillOS CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or simulate a learning session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Sign in, sign up and phone verification
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Learning logs and the knowledge graph
    Logs {
        #[command(subcommand)]
        action: commands::logs::LogsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    // RUST_LOG wins over the configured level. Logs go to stderr so stdout
    // stays clean for JSON output.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = Config::load()
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action).await,
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Logs { action } => commands::logs::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "skillos-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
