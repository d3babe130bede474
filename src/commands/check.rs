//! Check command implementation.
//!
//! Opens the bookmarks store the same way a scrape does and reports how many
//! URLs are readable.

use futures::StreamExt;

use crate::config::Config;
use crate::source::{SqliteSource, UrlSource};

/// Validates that the bookmarks store can be opened and queried.
pub async fn command_check(verbose: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Checking bookmarks store");
    println!("===========================");
    println!("   Database: {}", config.db());
    println!("   Query:    {}", config.query());

    let source = SqliteSource::connect(config.db(), config.query()).await?;
    source.ping().await?;

    let mut readable = 0usize;
    let mut skipped = 0usize;
    {
        let mut urls = source.open().await?;
        while let Some(row) = urls.next().await {
            match row {
                Ok(url) => {
                    readable += 1;
                    if verbose {
                        println!("   ├─ {}", url);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    if verbose {
                        println!("   ├─ ❌ {}", e);
                    }
                }
            }
        }
    }
    source.close().await;

    println!("   📊 Readable URLs: {}", readable);
    println!("   ⚠️  Skipped records: {}", skipped);
    println!("\n✅ Bookmarks store is readable");
    Ok(())
}
