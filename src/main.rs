// src/main.rs

use tsrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        if !err.is_reported() {
            eprintln!("tsrun error: {err}");
        }
        std::process::exit(1);
    }
}

async fn run_main() -> tsrun::errors::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
