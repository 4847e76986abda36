use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kudos-cli", version, about = "Kudos gamification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track an activity for a subject
    Track(commands::track::TrackArgs),
    /// Profile inspection
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Realtime stats
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Redeem a reward against a subject's balance
    Redeem(commands::redeem::RedeemArgs),
    /// Achievement catalog
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Track(args) => commands::track::run(args).await,
        Commands::Profile { action } => commands::profile::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Redeem(args) => commands::redeem::run(args).await,
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
