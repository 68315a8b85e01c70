//! dbhandle - database-level MongoDB administration
//!
//! Connects to a deployment, binds one database and runs a single
//! administrative operation, printing the server reply as JSON.
//!
//! # Usage
//!
//! ```bash
//! dbhandle --uri mongodb://localhost:27017/app collections
//! dbhandle -d app profile --set 1
//! dbhandle -d app deref people '{"$oid": "507f1f77bcf86cd799439011"}'
//! ```

use std::sync::Arc;
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use dbhandle::cli::CliInterface;
use dbhandle::connection::ConnectionManager;
use dbhandle::database::Database;
use dbhandle::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Answer local subcommands, or connect and run the operation
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    if let Some(output) = cli.handle_local_command()? {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    cli.config().validate()?;

    let mut manager = ConnectionManager::new(
        cli.get_connection_uri(),
        cli.config().connection.clone(),
    );
    manager.connect().await?;
    let manager = Arc::new(manager);

    let db = Database::new(manager.clone(), cli.get_database())?;
    debug!("Using database '{}'", db);

    let result = cli.execute(&db).await;
    drop(db);

    if let Ok(mut manager) = Arc::try_unwrap(manager) {
        manager.disconnect().await?;
    }

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// `RUST_LOG` takes precedence when set. Logs go to stderr so stdout
/// carries only the JSON result.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
