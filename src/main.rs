use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use falcon_summarizer::{article::ARTICLE, config, Settings, Summarizer};

#[tokio::main]
async fn main() -> Result<()> {
    let env_files = config::load_env_files(Path::new("."));

    // -----------------------------
    // Logging (stderr; stdout carries the result)
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    for file in &env_files {
        info!("loaded {}", file.display());
    }

    let settings = Settings::from_env().context("failed to read summarizer settings")?;
    let text = source_text()?;

    info!(
        "🎯 Summarizing {} chars with {}",
        text.chars().count(),
        settings.source.label()
    );

    // Loading and inference block; keep them off the async workers.
    let result = tokio::task::spawn_blocking(move || {
        let summarizer = Summarizer::shared(&settings)?;
        summarizer.summarize(&text, &settings.decoding)
    })
    .await
    .context("summarization task panicked")??;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Positional args replace the built-in article; `-` reads stdin.
fn source_text() -> Result<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(ARTICLE.to_string()),
        [dash] if dash == "-" => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read text from stdin")?;
            Ok(buf)
        }
        _ => Ok(args.join(" ")),
    }
}
