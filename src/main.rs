// src/main.rs

use jobdeck::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("jobdeck error: {err:?}");
            1
        }
    };
    // Exit here: an orphaned grandchild can keep an output reader blocked,
    // and dropping the runtime would wait for it.
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
