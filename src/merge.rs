use serde::Serialize;

use crate::catalog::JoinedRow;
use crate::normalize::Datum;

/// One attribute of one product. Repeated identical entries are preserved
/// as-is; the source data does not enforce uniqueness per product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecEntry {
    pub main_spec: Datum,
    pub spec: Datum,
    pub value: Datum,
    pub trailer: Datum,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedProduct {
    pub sku: String,
    pub product_name: Datum,
    pub brand_id: Datum,
    pub brand_name: Datum,
    pub main_group: Datum,
    pub main_group_name: Datum,
    pub sub_group: Datum,
    pub sub_group_name: Datum,
    pub specs: Vec<SpecEntry>,
}

/// Groups joined rows by the eight product-identifying columns and folds
/// each group's spec cells into an ordered `specs` list. Groups appear in
/// first-encounter order and rows keep their source order within a group.
/// Missing values are legitimate group-key values, so rows with absent
/// group cells still land in a group instead of being dropped. A row whose
/// four spec cells are all missing is pure left-join padding and
/// contributes no entry, which is how a product without any raw specs
/// nests as `specs = []`.
pub fn nest(rows: &[JoinedRow]) -> Vec<NestedProduct> {
    let mut products: Vec<NestedProduct> = Vec::new();

    for row in rows {
        let slot = match products.iter().position(|product| same_product(row, product)) {
            Some(index) => index,
            None => {
                products.push(NestedProduct {
                    sku: row.sku.clone(),
                    product_name: row.product_name.clone(),
                    brand_id: row.brand_id.clone(),
                    brand_name: row.brand_name.clone(),
                    main_group: row.main_group.clone(),
                    main_group_name: row.main_group_name.clone(),
                    sub_group: row.sub_group.clone(),
                    sub_group_name: row.sub_group_name.clone(),
                    specs: Vec::new(),
                });
                products.len() - 1
            }
        };

        if row.main_spec.is_missing()
            && row.spec.is_missing()
            && row.value.is_missing()
            && row.trailer.is_missing()
        {
            continue;
        }

        products[slot].specs.push(SpecEntry {
            main_spec: row.main_spec.clone(),
            spec: row.spec.clone(),
            value: row.value.clone(),
            trailer: row.trailer.clone(),
        });
    }

    products
}

fn same_product(row: &JoinedRow, product: &NestedProduct) -> bool {
    row.sku == product.sku
        && group_eq(&row.product_name, &product.product_name)
        && group_eq(&row.brand_id, &product.brand_id)
        && group_eq(&row.brand_name, &product.brand_name)
        && group_eq(&row.main_group, &product.main_group)
        && group_eq(&row.main_group_name, &product.main_group_name)
        && group_eq(&row.sub_group, &product.sub_group)
        && group_eq(&row.sub_group_name, &product.sub_group_name)
}

/// Group-key equality: unlike join keys, two missing values belong to the
/// same group.
fn group_eq(left: &Datum, right: &Datum) -> bool {
    if left.is_missing() && right.is_missing() {
        return true;
    }
    left == right
}

impl SpecEntry {
    pub fn to_datum(&self) -> Datum {
        Datum::Map(vec![
            ("mainSpec".to_string(), self.main_spec.clone()),
            ("spec".to_string(), self.spec.clone()),
            ("value".to_string(), self.value.clone()),
            ("trailer".to_string(), self.trailer.clone()),
        ])
    }
}

impl NestedProduct {
    pub fn to_datum(&self) -> Datum {
        Datum::Map(vec![
            ("sku".to_string(), Datum::text(self.sku.clone())),
            ("productName".to_string(), self.product_name.clone()),
            ("brandId".to_string(), self.brand_id.clone()),
            ("brandName".to_string(), self.brand_name.clone()),
            ("mainGroup".to_string(), self.main_group.clone()),
            ("mainGroupName".to_string(), self.main_group_name.clone()),
            ("subGroup".to_string(), self.sub_group.clone()),
            ("subGroupName".to_string(), self.sub_group_name.clone()),
            (
                "specs".to_string(),
                Datum::List(self.specs.iter().map(SpecEntry::to_datum).collect()),
            ),
        ])
    }
}

pub fn products_to_datum(products: &[NestedProduct]) -> Datum {
    Datum::List(products.iter().map(NestedProduct::to_datum).collect())
}

pub fn rows_to_datum(rows: &[JoinedRow]) -> Datum {
    Datum::List(
        rows.iter()
            .map(|row| {
                Datum::Map(vec![
                    ("sku".to_string(), Datum::text(row.sku.clone())),
                    ("productName".to_string(), row.product_name.clone()),
                    ("brandId".to_string(), row.brand_id.clone()),
                    ("brandName".to_string(), row.brand_name.clone()),
                    ("mainGroup".to_string(), row.main_group.clone()),
                    ("mainGroupName".to_string(), row.main_group_name.clone()),
                    ("subGroup".to_string(), row.sub_group.clone()),
                    ("subGroupName".to_string(), row.sub_group_name.clone()),
                    ("mainSpec".to_string(), row.main_spec.clone()),
                    ("spec".to_string(), row.spec.clone()),
                    ("value".to_string(), row.value.clone()),
                    ("trailer".to_string(), row.trailer.clone()),
                ])
            })
            .collect(),
    )
}
