use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::{self, CatalogPaths};
use crate::cli::StatusArgs;
use crate::template::TemplateLibrary;

pub fn run(args: StatusArgs) -> Result<()> {
    let paths = CatalogPaths::under(&args.data_root);

    for (table, path) in [
        ("products", &paths.products),
        ("prodgroup", &paths.prodgroup),
        ("specs_raw", &paths.specs_raw),
        ("specs", &paths.specs),
    ] {
        if path.exists() {
            match catalog::count_rows(path) {
                Ok(rows) => {
                    info!(table, path = %path.display(), rows, "catalog file present");
                }
                Err(error) => {
                    warn!(table, path = %path.display(), error = %error, "catalog file unreadable");
                }
            }
        } else {
            warn!(table, path = %path.display(), "catalog file missing");
        }
    }

    if args.templates.exists() {
        match TemplateLibrary::load(&args.templates) {
            Ok(library) => {
                info!(
                    count = library.len(),
                    names = ?library.names(),
                    "template library loaded"
                );
            }
            Err(error) => {
                warn!(path = %args.templates.display(), error = %error, "template library unreadable");
            }
        }
    } else {
        warn!(path = %args.templates.display(), "template directory missing");
    }

    if args.artifact.exists() {
        info!(path = %args.artifact.display(), "output artifact present");
    } else {
        info!(path = %args.artifact.display(), "output artifact not yet written");
    }

    Ok(())
}
