use anyhow::Result;
use clap::Parser;

use tubeblog_pipeline::core::config::{load_config, STARTER_CONFIG};
use tubeblog_pipeline::{ArticlePipeline, GenerationRequest};

/// Generate one blog article from a YouTube link and print the HTML.
#[derive(Parser, Debug)]
#[command(name = "tubeblog-generate", version)]
struct Cli {
    /// YouTube link (youtu.be, watch, shorts, embed or live URL)
    link: String,

    /// professional, casual, witty or technical
    #[arg(long)]
    tone: Option<String>,

    /// short, medium or long
    #[arg(long)]
    length: Option<String>,

    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Cache partition to use; the server uses the account id here
    #[arg(long, default_value_t = 0)]
    user_id: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    // Create a starter config on first run
    if !std::path::Path::new(&cli.config).exists() {
        std::fs::write(&cli.config, STARTER_CONFIG)?;
        log::info!("Wrote starter config to {}", cli.config);
    }

    let config = load_config(&cli.config)?;
    let pipeline = ArticlePipeline::from_config(&config)?;

    let request = GenerationRequest {
        user_id: cli.user_id,
        link: cli.link,
        tone: cli.tone,
        length: cli.length,
    };

    let article = pipeline.generate(&request).await?;
    log::info!("\"{}\" ({}, {})", article.title, article.tone, article.length);
    println!("{}", article.content);

    Ok(())
}
