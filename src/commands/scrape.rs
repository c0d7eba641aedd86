use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ScrapeArgs;
use crate::scrape::{SpecSource, TrustedSiteScraper};
use crate::util::write_json_pretty;

pub fn run(args: ScrapeArgs) -> Result<()> {
    let scraper = TrustedSiteScraper::new(Duration::from_secs(args.timeout_secs))?;
    let specs = scraper.fetch_specs(&args.product)?;
    info!(product = %args.product, sites = specs.len(), "scrape completed");

    let document: BTreeMap<String, String> = specs.into_iter().collect();

    match &args.out {
        Some(path) => {
            write_json_pretty(path, &document)?;
            info!(path = %path.display(), "wrote scraped specs");
        }
        None => {
            let rendered = serde_json::to_string_pretty(&document)
                .context("failed to render scraped specs")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
