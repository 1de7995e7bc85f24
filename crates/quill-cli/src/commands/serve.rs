//! Start the Quill server.

use clap::Args;

use quill_core::error::AppError;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the server host
    #[arg(long)]
    pub host: Option<String>,

    /// Skip database migrations on startup
    #[arg(long)]
    pub no_migrate: bool,

    /// Do not run the stale-upload sweeper in the background
    #[arg(long)]
    pub no_sweeper: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, env: &str) -> Result<(), AppError> {
    let mut config = super::load_config(env)?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if args.no_migrate {
        config.database.run_migrations = false;
    }
    if args.no_sweeper {
        config.worker.enabled = false;
    }

    println!("Starting Quill server...");
    println!("  Host: {}", config.server.host);
    println!("  Port: {}", config.server.port);
    println!("  Uploads: {}", config.upload.root);

    let (db, ledger, catalog) = super::open_database(&config).await?;
    let result = quill_api::run_server(config, ledger, catalog).await;
    db.close().await;
    result
}
