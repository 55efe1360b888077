//! Command-line entry point: mirror a media server into a local directory

use clap::Parser;
use mediaserver_mirror::{Config, Mirror, run_with_shutdown};
use std::path::PathBuf;
use tracing::{error, info};

/// Environment variable holding the API key
const API_KEY_VAR: &str = "MEDIASERVER_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "mediaserver-mirror", version, about = "Mirror a media server's channel tree to disk")]
struct Args {
    /// Existing directory the tree is mirrored into
    output_dir: PathBuf,

    /// Ignore cached API responses for this run
    #[arg(long)]
    force_reload: bool,

    /// Keep existing data.json snapshots instead of rewriting them
    #[arg(long)]
    reuse_snapshots: bool,

    /// Only list the items that would be mirrored
    #[arg(long)]
    list: bool,

    /// Token sent as `_=<TOKEN>` on listing, media and annotation calls
    #[arg(long, value_name = "TOKEN")]
    cache_buster: Option<String>,

    /// Media server base URL
    #[arg(long, value_name = "URL", default_value = mediaserver_mirror::config::DEFAULT_SERVER_URL)]
    server_url: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> mediaserver_mirror::Result<()> {
    let api_key = std::env::var(API_KEY_VAR).unwrap_or_default();

    let mut config = Config::new(args.output_dir, api_key);
    config.server_url = args.server_url;
    config.cache.force_reload = args.force_reload;
    config.cache.reuse_snapshots = args.reuse_snapshots;
    config.cache.cache_buster = args.cache_buster;
    config.validate()?;

    let mirror = Mirror::new(config).await?;

    if args.list {
        let items = mirror.enumerate().await?;
        for (dir, video) in &items {
            let state = if video.ready { "ready" } else { "not ready" };
            println!("{}\t{}\t{}\t{}", dir.display(), video.oid, state, video.title);
        }
        info!(items = items.len(), "Listing finished");
        return Ok(());
    }

    if let Some(stats) = run_with_shutdown(&mirror).await? {
        info!(%stats, "Done");
    }
    Ok(())
}
