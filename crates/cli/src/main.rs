use std::path::PathBuf;

use anyhow::Context;
use book_outlet::App;
use clap::{Parser, Subcommand};
use outlet_kernel::Settings;

/// Book Outlet catalog service
#[derive(Parser, Debug)]
#[command(name = "outlet", version, about)]
struct Cli {
    /// Directory holding base.toml and the per-environment overlays
    #[arg(long, global = true, env = "OUTLET_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Environment overlay to load (local, staging, production)
    #[arg(long = "env", global = true, env = "OUTLET_ENV", default_value = "local")]
    environment: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate, start every module and serve HTTP until shutdown
    Serve {
        /// Port to listen on, overriding the configured one
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// SQLite database URL, overriding the configured one
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Apply pending migrations and exit
    Migrate {
        /// SQLite database URL, overriding the configured one
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Print the module mount table
    Routes,
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let config_dir = match &self.config_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };
        Settings::load_from(&config_dir, &self.environment)
            .with_context(|| format!("failed to load settings from {}", config_dir.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` feeds the clap `env` fallbacks too, so it loads before parsing.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut settings = cli.settings()?;
    outlet_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve { port, database_url } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(url) = database_url {
                settings.database.url = url;
            }
            tracing::info!(env = ?settings.environment, db = %settings.database.url, "starting book outlet");
            App::build(settings).await?.serve().await
        }
        Command::Migrate { database_url } => {
            if let Some(url) = database_url {
                settings.database.url = url;
            }
            let app = App::build(settings).await?;
            let applied = app.migrate().await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::Routes => {
            let pool = outlet_db::connect_in_memory()
                .await
                .context("failed to open scratch database")?;
            let app = App::with_pool(settings, pool)?;
            for (module, path) in app.registry().mounts() {
                println!("{module:<10} {path}");
            }
            Ok(())
        }
    }
}
