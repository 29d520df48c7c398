//! mindmap-persistence: load and save editor maps from the command line
//!
//! Talks to the same document endpoint the editor uses, which makes it handy
//! for seeding maps and checking a backend without a browser.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use mindmap_persistence::{
    AppConfig, MapDocument, PersistenceManager, RestPersistenceManager, SaveOutcome,
};

#[derive(Parser)]
#[command(name = "mindmap-persistence")]
#[command(about = "Load and save mind maps through the REST document endpoint")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "mindmap.toml")]
    config: PathBuf,

    /// Backend origin (overrides config file)
    #[arg(long, env = "MINDMAP_ORIGIN")]
    origin: Option<String>,

    /// CSRF token sent as the XSRF-TOKEN cookie
    #[arg(long, env = "MINDMAP_XSRF_TOKEN")]
    xsrf_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a map and print its XML
    Load {
        /// Map id (defaults to the configured map)
        #[arg(long)]
        map: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Upload a map from an XML file
    Save {
        /// Map id (defaults to the configured map)
        #[arg(long)]
        map: Option<String>,

        /// XML file to upload
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mindmap_persistence=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(origin) = cli.origin {
        config.persistence.origin = origin;
    }

    let manager = RestPersistenceManager::new(config.persistence.clone())?;

    match cli.command {
        Command::Load { map, out } => {
            let map_id = map.unwrap_or_else(|| config.map.id.clone());
            seed_xsrf_cookie(&manager, &map_id, cli.xsrf_token.as_deref())?;

            let document = manager.load_map(&map_id).await?;
            let xml = document.to_xml()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, xml)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(map_id = %map_id, path = %path.display(), "Map written");
                }
                None => println!("{}", xml),
            }
        }
        Command::Save { map, file } => {
            let map_id = map.unwrap_or_else(|| config.map.id.clone());
            seed_xsrf_cookie(&manager, &map_id, cli.xsrf_token.as_deref())?;

            let xml = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let document = MapDocument::parse(&xml)?;

            let (tx, mut rx) = mpsc::unbounded_channel::<SaveOutcome>();
            manager.save_map(&map_id, &document, Arc::new(tx))?.settled().await;

            match rx.try_recv() {
                Ok(SaveOutcome::Saved) => info!(map_id = %map_id, "Map saved"),
                Ok(SaveOutcome::Failed(error)) => bail!("save failed: {}", error),
                Err(_) => bail!("save was rejected by the server without an error message"),
            }
        }
    }

    Ok(())
}

fn seed_xsrf_cookie(
    manager: &RestPersistenceManager,
    map_id: &str,
    token: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(token) = token {
        let url = manager.document_url(map_id)?;
        let cookie = format!("{}={}; Path=/", manager.config().xsrf_cookie, token);
        manager.cookie_jar().add_cookie_str(&cookie, &url);
    }
    Ok(())
}
