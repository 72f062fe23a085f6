//! Fetches the agriculture news feed once and prints the latest entries.

use backend::config::ServerConfig;
use backend::news::{write_entries, NewsService};
use std::io::Write;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let config = ServerConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let service = NewsService::new(&config.news.feed_url).map_err(|e| {
        log::error!("Invalid news feed URL: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    let articles = service.fetch(None).await.map_err(|e| {
        log::error!("Failed to fetch {}: {}", service.feed_url(), e);
        std::io::Error::other(e.to_string())
    })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let printed = write_entries(&mut out, &articles, config.news.poll_limit)?;
    out.flush()?;
    log::info!("Printed {} of {} entries", printed, articles.len());
    Ok(())
}
