use anyhow::{Context, Result};
use clap::Parser;
use portfolio_images::batch::{discover, request_for_file, request_for_url};
use portfolio_images::models::Config;
use portfolio_images::pipeline::{Pipeline, SourceRequest};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "portfolio-images")]
#[command(about = "Derive resized, re-encoded variants and placeholders for post images")]
struct CliArgs {
    /// Only process images of this post.
    #[arg(long)]
    post_id: Option<String>,

    /// Regenerate outputs even when they are up to date.
    #[arg(long)]
    force: bool,

    /// Process a single raw file; the post id is its parent directory.
    #[arg(long, value_name = "PATH", conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Process a remote cover image.
    #[arg(long, requires = "post_id", requires = "name")]
    url: Option<String>,

    /// Base name for outputs of --url.
    #[arg(long, requires = "url")]
    name: Option<String>,

    #[arg(long)]
    debug: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Exit non-zero if any artifact failed. Also enabled by CI=true.
    #[arg(long)]
    strict: bool,
}

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "portfolio_images=debug"
    } else {
        "portfolio_images=info"
    }
}

fn build_requests(args: &CliArgs, config: &Config) -> Result<Vec<SourceRequest>> {
    if let Some(url) = &args.url {
        let post_id = args.post_id.as_deref().context("--url requires --post-id")?;
        let name = args.name.as_deref().context("--url requires --name")?;
        return Ok(vec![request_for_url(
            url,
            post_id,
            name,
            &config.public_dir,
            args.force,
        )]);
    }

    if let Some(file) = &args.file {
        return Ok(vec![request_for_file(file, &config.public_dir, args.force)?]);
    }

    let images = discover(&config.raw_dir, args.post_id.as_deref())?;
    Ok(images
        .iter()
        .map(|image| image.to_request(&config.public_dir, args.force))
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(args.debug).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting portfolio-images");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let strict = args.strict || config.strict;

    let pipeline = match Pipeline::new(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to initialize pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let requests = match build_requests(&args, &config) {
        Ok(requests) => requests,
        Err(e) => {
            error!("Failed to collect images: {:#}", e);
            std::process::exit(1);
        }
    };

    if requests.is_empty() {
        warn!("No images to process in {}", config.raw_dir.display());
    }

    let report = pipeline.process_batch(&requests).await;

    if args.json {
        println!("{}", report.to_json()?);
    }

    if strict && report.has_failures() {
        error!(
            "{} artifact(s) failed in strict mode",
            report.summary().errored
        );
        std::process::exit(1);
    }

    Ok(())
}
