use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::catalog::{CatalogPaths, CatalogStore, LookupKey};
use crate::cli::FillArgs;
use crate::completion::{ChatCompletionClient, CompletionConfig};
use crate::merge::{nest, products_to_datum};
use crate::model::FillRunManifest;
use crate::normalize::normalize;
use crate::reconcile::{FillTarget, Reconciler};
use crate::scrape::{FileSpecSource, SpecSource, TrustedSiteScraper};
use crate::template::TemplateLibrary;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: FillArgs) -> Result<()> {
    let run_id = format!("fill-{}", utc_compact_string(Utc::now()));
    info!(run_id = %run_id, product = %args.product, "starting fill");

    let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;

    let scraped = match &args.scraped_file {
        Some(path) => FileSpecSource::new(path).fetch_specs(&args.product)?,
        None => TrustedSiteScraper::new(Duration::from_secs(args.scrape_timeout_secs))?
            .fetch_specs(&args.product)?,
    };
    info!(sources = scraped.len(), "collected specification sources");

    let mut template_name = None;
    let target = if args.from_catalog {
        let store = CatalogStore::new(CatalogPaths::under(&args.data_root));
        let key = if args.by_sku {
            LookupKey::Sku
        } else {
            LookupKey::ProductName
        };
        let rows = store.lookup(&[args.product.clone()], key)?;
        if rows.is_empty() {
            bail!("no catalog rows found for {}", args.product);
        }
        let products = nest(&rows);
        info!(products = products.len(), "loaded existing catalog specs");
        let document = serde_json::to_value(normalize(&products_to_datum(&products)))
            .context("failed to convert catalog specs to json")?;
        FillTarget::Existing(document)
    } else {
        let library = TemplateLibrary::load(&args.templates)?;
        let template = library
            .select(&args.product)
            .with_context(|| format!("no template matches product name: {}", args.product))?;
        info!(template = %template.name, "selected template");
        template_name = Some(template.name.clone());
        FillTarget::Template(template.document.clone())
    };

    let client = ChatCompletionClient::new(CompletionConfig {
        api_base: args.api_base.clone(),
        api_key,
        model: args.model.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
    })?;

    let reconciler = Reconciler::new(&client, &args.out)?;
    let outcome = reconciler.reconcile(&args.product, &scraped, &target)?;

    let manifest = FillRunManifest {
        manifest_version: 1,
        run_id,
        generated_at: now_utc_string(),
        product: args.product.clone(),
        mode: if args.from_catalog {
            "catalog".to_string()
        } else {
            "template".to_string()
        },
        template: template_name,
        sources: scraped.iter().map(|(site, _)| site.clone()).collect(),
        attempts: outcome.attempts,
        artifact_path: args.out.display().to_string(),
    };
    let manifest_path = args.out.with_extension("run.json");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        attempts = outcome.attempts,
        artifact = %args.out.display(),
        manifest = %manifest_path.display(),
        "fill completed"
    );

    let rendered = serde_json::to_string_pretty(&outcome.document)
        .context("failed to render reconciled document")?;
    println!("{rendered}");

    Ok(())
}
