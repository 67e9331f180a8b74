use clap::Parser;
use tracing::{debug, error};

use jsedb::cli::{commands, config::CliArgs, output};
use jsedb::{logging, Database};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    logging::init(&config.logging);

    if let Err(e) = tokio::fs::create_dir_all(&config.database.path).await {
        error!("Could not create {}: {}", config.database.path.display(), e);
        std::process::exit(1);
    }

    let db = Database::open(config.database);
    debug!("Using database file {}", db.file_path().display());

    let result = commands::run(&db, &args.command).await;
    db.close().await;

    match result {
        Ok(value) => println!("{}", output::format_value(&value, args.raw)),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
