use clap::Parser;
use connsoak::cli::{self, CheckCommand, Cli, Commands};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Check(CheckCommand::Config(arg)) => cli::check::execute_config(arg.config.as_deref()),
        Commands::Check(CheckCommand::Connection(arg)) => {
            cli::check::execute_connection(arg.config.as_deref()).await
        }
    };

    if let Err(e) = result {
        cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
