mod cli;
mod context;
mod handlers;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    if let Ok(log_path) = std::env::var("KAN_DEBUG_LOG") {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            Ok(log_file) => {
                tracing_subscriber::fmt()
                    .with_writer(log_file)
                    .with_max_level(tracing::Level::DEBUG)
                    .with_target(true)
                    .with_ansi(false)
                    .init();
            }
            Err(e) => eprintln!("cannot open KAN_DEBUG_LOG file {log_path}: {e}"),
        }
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .init();
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let json = cli.json;
    match cli.command {
        Commands::Init(args) => handlers::project::init(&cli.dir, args, json).await?,
        Commands::Board(cmd) => handlers::board::handle(&cli.dir, cmd.action, json).await?,
        Commands::Column(cmd) => handlers::column::handle(&cli.dir, cmd.action, json).await?,
        Commands::Card(cmd) => handlers::card::handle(&cli.dir, cmd.action, json).await?,
        Commands::Comment(cmd) => handlers::card::handle_comment(&cli.dir, cmd.action, json).await?,
        Commands::Migrate(args) => handlers::migrate::handle(&cli.dir, args, json).await?,
        Commands::Doctor(args) => {
            let healthy = handlers::doctor::handle(&cli.dir, args, json).await?;
            return Ok(if healthy { 0 } else { 1 });
        }
        Commands::Serve(args) => handlers::serve::handle(&cli.dir, args).await?,
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "kan", &mut std::io::stdout());
        }
    }
    Ok(0)
}
