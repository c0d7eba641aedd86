use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::{CatalogPaths, CatalogStore, LookupKey};
use crate::cli::LookupArgs;
use crate::merge::{nest, products_to_datum, rows_to_datum};
use crate::normalize::normalize;
use crate::util::write_json_pretty;

pub fn run(args: LookupArgs) -> Result<()> {
    let store = CatalogStore::new(CatalogPaths::under(&args.data_root));
    let key = if args.by_sku {
        LookupKey::Sku
    } else {
        LookupKey::ProductName
    };

    let rows = store.lookup(&args.identifiers, key)?;
    info!(
        identifiers = args.identifiers.len(),
        rows = rows.len(),
        "catalog lookup completed"
    );

    let document = if args.nested {
        let products = nest(&rows);
        info!(products = products.len(), "nested rows into products");
        normalize(&products_to_datum(&products))
    } else {
        normalize(&rows_to_datum(&rows))
    };

    match &args.out {
        Some(path) => {
            write_json_pretty(path, &document)?;
            info!(path = %path.display(), "wrote lookup result");
        }
        None => {
            let rendered = serde_json::to_string_pretty(&document)
                .context("failed to render lookup result")?;
            println!("{rendered}");
        }
    }

    Ok(())
}
