// src/main.rs

use pushdeploy::errors::DeployError;
use pushdeploy::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("pushdeploy error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run_main() -> Result<(), DeployError> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
