use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use videoflix::api::{ProgressApi, VideoflixApi};
use videoflix::config::Config;
use videoflix::models::{MovieSlug, ProgressRecord};
use videoflix::utils::WatchError;

const USAGE: &str = "\
Usage: videoflix-probe [--base-url URL] [--finish | --position SECONDS] <slug>

Fetches the resume record for <slug> and prints it.
  --finish            mark the title as finished
  --position SECONDS  store SECONDS as the resume position
";

struct Args {
    slug: MovieSlug,
    base_url: Option<String>,
    update: Option<ProgressRecord>,
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let finish = args.contains("--finish");
    let position: Option<u64> = args
        .opt_value_from_str("--position")
        .context("--position expects whole seconds")?;
    let base_url: Option<String> = args.opt_value_from_str("--base-url")?;

    let slug = args
        .finish()
        .into_iter()
        .next()
        .and_then(|s| s.into_string().ok())
        .context("missing <slug>")?;

    let update = match (finish, position) {
        (true, Some(_)) => bail!("--finish and --position are mutually exclusive"),
        (true, None) => Some(ProgressRecord::finished()),
        (false, Some(seconds)) => Some(ProgressRecord::at(seconds)),
        (false, None) => None,
    };

    Ok(Some(Args {
        slug: MovieSlug::new(slug),
        base_url,
        update,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("videoflix=debug")),
        )
        .init();

    let Some(args) = parse_args()? else {
        print!("{}", USAGE);
        return Ok(());
    };

    let mut config = Config::load()?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    info!("Using backend at {}", config.api.base_url);

    let api = VideoflixApi::new(&config.api)?;

    let record = api
        .fetch_progress(&args.slug)
        .await
        .map_err(|e| match e {
            e if e.is_not_found() => WatchError::NotFound(args.slug.to_string()),
            e => WatchError::Api(e),
        })?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    if let Some(update) = args.update {
        api.update_progress(&args.slug, update)
            .await
            .map_err(|e| WatchError::Persistence(e.to_string()))?;
        println!(
            "Saved progress for {}: {}s (finished: {})",
            args.slug,
            update.position_seconds(),
            update.is_finished()
        );
    }

    Ok(())
}
