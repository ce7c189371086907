use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod run;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,lists_jobs_core=info,lists_jobs_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = args::Cli::parse();
    let code = match run::run(cli).await {
        Ok(outcome) => {
            println!("{}", run::summary(&outcome));
            outcome.exit_code()
        }
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            2
        }
    };
    std::process::exit(code);
}
