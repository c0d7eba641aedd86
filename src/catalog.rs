use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Serialize;

use crate::normalize::{Datum, MISSING};

pub const CATALOG_DELIMITER: u8 = b';';

pub const PRODUCTS_FILE: &str = "products.csv";
pub const PRODGROUP_FILE: &str = "prodgroup.csv";
pub const SPECS_RAW_FILE: &str = "specs_raw.csv";
pub const SPECS_FILE: &str = "specs.csv";

/// Locations of the four catalog tables. Each lookup reloads them from disk,
/// so there is no cross-request staleness and no shared mutable cache.
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub products: PathBuf,
    pub prodgroup: PathBuf,
    pub specs_raw: PathBuf,
    pub specs: PathBuf,
}

impl CatalogPaths {
    pub fn under(data_root: &Path) -> Self {
        Self {
            products: data_root.join(PRODUCTS_FILE),
            prodgroup: data_root.join(PRODGROUP_FILE),
            specs_raw: data_root.join(SPECS_RAW_FILE),
            specs: data_root.join(SPECS_FILE),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LookupKey {
    Sku,
    ProductName,
}

/// One row of the joined result set, columns in the fixed output order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRow {
    pub sku: String,
    pub product_name: Datum,
    pub brand_id: Datum,
    pub brand_name: Datum,
    pub main_group: Datum,
    pub main_group_name: Datum,
    pub sub_group: Datum,
    pub sub_group_name: Datum,
    pub main_spec: Datum,
    pub spec: Datum,
    pub value: Datum,
    pub trailer: Datum,
}

pub struct CatalogStore {
    paths: CatalogPaths,
}

impl CatalogStore {
    pub fn new(paths: CatalogPaths) -> Self {
        Self { paths }
    }

    /// Filters the products table by exact match on SKU or product name
    /// (single identifier or a batch), then runs the left-join chain
    /// products ⨝ prodgroup ⨝ specs_raw ⨝ specs. Unmatched identifiers
    /// yield an empty result set, not an error; unmatched join sides pad
    /// their columns with the missing sentinel.
    pub fn lookup(&self, identifiers: &[String], key: LookupKey) -> Result<Vec<JoinedRow>> {
        let products = load_table(&self.paths.products)?;
        let prodgroup = load_table(&self.paths.prodgroup)?;
        let specs_raw = load_table(&self.paths.specs_raw)?;
        let specs = load_table(&self.paths.specs)?;

        let p_sku = products.column("sku")?;
        let p_name = products.column("productName")?;
        let p_brand = products.column("brandId")?;
        let p_main = products.column("mainGroup")?;
        let p_sub = products.column("subGroup")?;

        let g_brand = prodgroup.column("brandId")?;
        let g_brand_name = prodgroup.column("brandName")?;
        let g_main = prodgroup.column("mainGroup")?;
        let g_main_name = prodgroup.column("mainGroupName")?;
        let g_sub = prodgroup.column("subGroup")?;
        let g_sub_name = prodgroup.column("subGroupName")?;

        let r_sku = specs_raw.column("sku")?;
        let r_main_spec = specs_raw.column("mainSpec")?;
        let r_spec = specs_raw.column("spec")?;
        let r_value = specs_raw.column("value")?;

        let t_sku = specs.column("sku")?;
        let t_spec = specs.column("spec")?;
        let t_value = specs.column("value")?;
        let t_trailer = specs.column("trailer")?;

        let selected: Vec<&Vec<Datum>> = products
            .rows
            .iter()
            .filter(|row| match key {
                LookupKey::Sku => row[p_sku]
                    .as_text()
                    .map(|sku| identifiers.iter().any(|id| id == sku))
                    .unwrap_or(false),
                LookupKey::ProductName => row[p_name]
                    .as_text()
                    .map(|name| identifiers.iter().any(|id| id == name))
                    .unwrap_or(false),
            })
            .collect();

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let mut joined = Vec::new();

        for row in selected {
            let sku = row[p_sku].as_text().unwrap_or_default().to_string();

            let mut group_matches: Vec<(Datum, Datum, Datum)> = prodgroup
                .rows
                .iter()
                .filter(|group| {
                    join_eq(&row[p_brand], &group[g_brand])
                        && join_eq(&row[p_main], &group[g_main])
                        && join_eq(&row[p_sub], &group[g_sub])
                })
                .map(|group| {
                    (
                        group[g_brand_name].clone(),
                        group[g_main_name].clone(),
                        group[g_sub_name].clone(),
                    )
                })
                .collect();
            if group_matches.is_empty() {
                group_matches.push((MISSING, MISSING, MISSING));
            }

            for (brand_name, main_group_name, sub_group_name) in group_matches {
                let mut spec_matches: Vec<(Datum, Datum, Datum)> = specs_raw
                    .rows
                    .iter()
                    .filter(|entry| join_eq(&row[p_sku], &entry[r_sku]))
                    .map(|entry| {
                        (
                            entry[r_main_spec].clone(),
                            entry[r_spec].clone(),
                            entry[r_value].clone(),
                        )
                    })
                    .collect();
                if spec_matches.is_empty() {
                    spec_matches.push((MISSING, MISSING, MISSING));
                }

                for (main_spec, spec, value) in spec_matches {
                    let mut trailers: Vec<Datum> = specs
                        .rows
                        .iter()
                        .filter(|entry| {
                            join_eq(&row[p_sku], &entry[t_sku])
                                && join_eq(&spec, &entry[t_spec])
                                && join_eq(&value, &entry[t_value])
                        })
                        .map(|entry| entry[t_trailer].clone())
                        .collect();
                    if trailers.is_empty() {
                        trailers.push(MISSING);
                    }

                    for trailer in trailers {
                        joined.push(JoinedRow {
                            sku: sku.clone(),
                            product_name: row[p_name].clone(),
                            brand_id: row[p_brand].clone(),
                            brand_name: brand_name.clone(),
                            main_group: row[p_main].clone(),
                            main_group_name: main_group_name.clone(),
                            sub_group: row[p_sub].clone(),
                            sub_group_name: sub_group_name.clone(),
                            main_spec: main_spec.clone(),
                            spec: spec.clone(),
                            value: value.clone(),
                            trailer,
                        });
                    }
                }
            }
        }

        Ok(joined)
    }
}

/// Join-key equality. The missing sentinel never matches anything; integer
/// and float keys compare numerically so a key column widened by a missing
/// value still joins against its integer counterpart.
fn join_eq(left: &Datum, right: &Datum) -> bool {
    if left.is_missing() || right.is_missing() {
        return false;
    }
    match (left, right) {
        (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => *a as f64 == *b,
        (a, b) => a == b,
    }
}

struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<Datum>>,
}

impl Table {
    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .with_context(|| {
                format!(
                    "catalog file {} is missing column {name}",
                    self.path.display()
                )
            })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ColumnKind {
    Int,
    Float,
    Flag,
    Text,
}

fn load_table(path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(CATALOG_DELIMITER)
        .from_path(path)
        .with_context(|| format!("failed to open catalog file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("failed to read catalog file: {}", path.display()))?;
        raw_rows.push(record.iter().map(ToOwned::to_owned).collect());
    }

    let kinds = infer_column_kinds(&raw_rows, headers.len());

    let rows = raw_rows
        .into_iter()
        .map(|raw| {
            raw.iter()
                .enumerate()
                .map(|(index, cell)| {
                    if headers[index] == "sku" {
                        sku_datum(cell)
                    } else {
                        cell_datum(cell, kinds[index])
                    }
                })
                .collect()
        })
        .collect();

    Ok(Table {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn infer_column_kinds(rows: &[Vec<String>], width: usize) -> Vec<ColumnKind> {
    (0..width)
        .map(|index| {
            let mut kind = None;
            for row in rows {
                let cell = row[index].trim();
                if cell.is_empty() {
                    continue;
                }
                let candidate = classify_cell(cell);
                kind = Some(match kind {
                    None => candidate,
                    Some(previous) => combine_kinds(previous, candidate),
                });
            }
            kind.unwrap_or(ColumnKind::Text)
        })
        .collect()
}

fn classify_cell(cell: &str) -> ColumnKind {
    if cell.parse::<i64>().is_ok() {
        ColumnKind::Int
    } else if cell.parse::<f64>().is_ok() {
        ColumnKind::Float
    } else if is_flag_literal(cell) {
        ColumnKind::Flag
    } else {
        ColumnKind::Text
    }
}

fn combine_kinds(left: ColumnKind, right: ColumnKind) -> ColumnKind {
    match (left, right) {
        (a, b) if a == b => a,
        (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
            ColumnKind::Float
        }
        _ => ColumnKind::Text,
    }
}

fn is_flag_literal(cell: &str) -> bool {
    cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false")
}

/// `sku` columns are always treated as trimmed text so joins never fail on
/// a numeric-vs-string mismatch between files.
fn sku_datum(cell: &str) -> Datum {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        MISSING
    } else {
        Datum::text(trimmed)
    }
}

fn cell_datum(cell: &str, kind: ColumnKind) -> Datum {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return MISSING;
    }
    match kind {
        ColumnKind::Int => trimmed
            .parse::<i64>()
            .map(Datum::Int)
            .unwrap_or_else(|_| Datum::text(cell)),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .map(Datum::Float)
            .unwrap_or_else(|_| Datum::text(cell)),
        ColumnKind::Flag => {
            if trimmed.eq_ignore_ascii_case("true") {
                Datum::Flag(true)
            } else {
                Datum::Flag(false)
            }
        }
        ColumnKind::Text => Datum::text(cell),
    }
}

/// Row count of a single catalog file, header excluded.
pub fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = ReaderBuilder::new()
        .delimiter(CATALOG_DELIMITER)
        .from_path(path)
        .with_context(|| format!("failed to open catalog file: {}", path.display()))?;

    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("failed to read catalog file: {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{CatalogPaths, CatalogStore, LookupKey};
    use crate::normalize::Datum;

    fn write_fixture_catalog(root: &Path) {
        fs::write(
            root.join("products.csv"),
            "sku;productName;brandId;mainGroup;subGroup\n\
             1110528;MSI GeForce RTX 4070 VENTUS;14;100;10\n\
             1110529;Gigabyte EAGLE GeForce RTX 4060 Ti OC;12;100;10\n",
        )
        .expect("products fixture");
        fs::write(
            root.join("prodgroup.csv"),
            "brandId;brandName;mainGroup;mainGroupName;subGroup;subGroupName\n\
             12;Gigabyte;100;Components;10;Graphics Cards\n\
             14;MSI;100;Components;10;Graphics Cards\n",
        )
        .expect("prodgroup fixture");
        fs::write(
            root.join("specs_raw.csv"),
            "sku;mainSpec;spec;value\n\
             1110529 ;Memory;Video_Memory;8 GB\n\
             1110529;Memory;VGA_Memory_Type;GDDR6\n",
        )
        .expect("specs_raw fixture");
        fs::write(
            root.join("specs.csv"),
            "sku;spec;value;trailer\n\
             1110529;Video_Memory;8 GB;verified\n",
        )
        .expect("specs fixture");
    }

    fn fixture_store(root: &Path) -> CatalogStore {
        write_fixture_catalog(root);
        CatalogStore::new(CatalogPaths::under(root))
    }

    #[test]
    fn lookup_by_sku_joins_all_four_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(&["1110529".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sku, "1110529");
        assert_eq!(rows[0].brand_name, Datum::text("Gigabyte"));
        assert_eq!(rows[0].spec, Datum::text("Video_Memory"));
        assert_eq!(rows[0].trailer, Datum::text("verified"));
        assert_eq!(rows[1].spec, Datum::text("VGA_Memory_Type"));
        assert!(rows[1].trailer.is_missing());
    }

    #[test]
    fn lookup_by_product_name_matches_exactly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(
                &["Gigabyte EAGLE GeForce RTX 4060 Ti OC".to_string()],
                LookupKey::ProductName,
            )
            .expect("lookup should succeed");
        assert_eq!(rows.len(), 2);

        let partial = store
            .lookup(&["Gigabyte EAGLE".to_string()], LookupKey::ProductName)
            .expect("lookup should succeed");
        assert!(partial.is_empty());
    }

    #[test]
    fn lookup_unknown_identifier_returns_empty_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(&["9999999".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");
        assert!(rows.is_empty());
    }

    #[test]
    fn lookup_without_spec_rows_pads_with_missing_cells() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(&["1110528".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].brand_name, Datum::text("MSI"));
        assert!(rows[0].main_spec.is_missing());
        assert!(rows[0].spec.is_missing());
        assert!(rows[0].value.is_missing());
        assert!(rows[0].trailer.is_missing());
    }

    #[test]
    fn lookup_accepts_a_batch_of_identifiers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(
                &["1110528".to_string(), "1110529".to_string()],
                LookupKey::Sku,
            )
            .expect("lookup should succeed");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sku, "1110528");
        assert_eq!(rows[1].sku, "1110529");
    }

    #[test]
    fn padded_sku_cells_join_as_trimmed_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        // The first specs_raw row carries a trailing space in its sku cell.
        let rows = store
            .lookup(&["1110529".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");
        assert_eq!(rows[0].value, Datum::text("8 GB"));
    }

    #[test]
    fn numeric_columns_are_typed_as_integers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(&["1110529".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");
        assert_eq!(rows[0].brand_id, Datum::Int(12));
        assert_eq!(rows[0].main_group, Datum::Int(100));
    }

    #[test]
    fn product_without_raw_specs_nests_with_an_empty_spec_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = fixture_store(dir.path());

        let rows = store
            .lookup(&["1110528".to_string()], LookupKey::Sku)
            .expect("lookup should succeed");
        let products = crate::merge::nest(&rows);

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].sku, "1110528");
        assert!(products[0].specs.is_empty());
    }

    #[test]
    fn missing_catalog_file_is_a_fatal_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_fixture_catalog(dir.path());
        fs::remove_file(dir.path().join("specs.csv")).expect("remove specs");

        let store = CatalogStore::new(CatalogPaths::under(dir.path()));
        let error = store
            .lookup(&["1110529".to_string()], LookupKey::Sku)
            .expect_err("lookup should fail");
        assert!(error.to_string().contains("specs.csv"));
    }

    #[test]
    fn missing_schema_column_is_a_fatal_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_fixture_catalog(dir.path());
        fs::write(dir.path().join("specs.csv"), "sku;spec;value\n").expect("rewrite specs");

        let store = CatalogStore::new(CatalogPaths::under(dir.path()));
        let error = store
            .lookup(&["1110529".to_string()], LookupKey::Sku)
            .expect_err("lookup should fail");
        assert!(error.to_string().contains("missing column trailer"));
    }
}
