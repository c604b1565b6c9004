use tracing::{info, warn};

use std::{collections::HashMap, hash::Hash};

use crate::{
    date::SaleDate,
    tables::{Brand, Product, Sale, Store},
};

/// A product with its brand resolved by name.
///
/// Fields follow the column order of the brand join: product name, the
/// product's own brand-name field, product id, then the matched brand's name
/// and id. The brand fields are `None` when no brand has that name.
#[derive(Clone, Debug, PartialEq)]
pub struct BrandedProduct {
    pub product_name: String,
    pub product_brand_name: Option<String>,
    pub product_id: i64,
    pub brand_name: Option<String>,
    pub brand_id: Option<i64>,
}

/// A sale with its product, brand, and store attributes.
///
/// Every enrichment field is `None` when the corresponding key found no
/// match. That is valid output, not an error.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedSale {
    pub date: SaleDate,
    pub product: i64,
    pub store: i64,
    pub quantity: i64,
    pub product_name: Option<String>,
    pub product_id: Option<i64>,
    pub brand_name: Option<String>,
    pub brand_id: Option<i64>,
    pub store_name: Option<String>,
    pub store_city: Option<String>,
    pub store_id: Option<i64>,
}

/// Builds a key -> row positions index over `rows`, keeping file order
/// within each key.
fn index_by<T, K, F>(rows: &[T], key: F) -> HashMap<K, Vec<usize>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        index.entry(key(row)).or_default().push(i);
    }
    index
}

/// Left-joins `left` to `right`, calling `emit` once per match, or once with
/// `None` when nothing matches. Left order is preserved; several matches
/// for one key come out in right-table order.
fn left_join<'r, L, R, K, O>(
    left: &[L],
    right: &'r [R],
    index: &HashMap<K, Vec<usize>>,
    left_key: impl Fn(&L) -> Option<K>,
    emit: impl Fn(&L, Option<&'r R>) -> O,
) -> (Vec<O>, usize)
where
    K: Eq + Hash,
{
    let mut out = Vec::with_capacity(left.len());
    let mut misses = 0;
    for row in left {
        match left_key(row).and_then(|k| index.get(&k)) {
            Some(positions) => {
                out.extend(positions.iter().map(|&i| emit(row, Some(&right[i]))));
            }
            None => {
                misses += 1;
                out.push(emit(row, None));
            }
        }
    }
    (out, misses)
}

/// Resolves each product's brand by matching its `brand` field against
/// brand names.
///
/// The match is exact: case and surrounding whitespace matter. Products
/// whose brand name is unknown, or missing, are kept with empty brand
/// fields.
#[must_use]
pub fn resolve_brand_for_product(products: &[Product], brands: &[Brand]) -> Vec<BrandedProduct> {
    let index = index_by(brands, |b| b.name.clone());
    let (branded, misses) = left_join(
        products,
        brands,
        &index,
        |p| p.brand.clone(),
        |p, b| BrandedProduct {
            product_name: p.name.clone(),
            product_brand_name: p.brand.clone(),
            product_id: p.id,
            brand_name: b.map(|b| b.name.clone()),
            brand_id: b.map(|b| b.id),
        },
    );
    if misses > 0 {
        warn!(misses, "products with no matching brand name");
    }
    branded
}

/// Attaches product, brand, and store attributes to every sale.
///
/// Sales are joined to `products` on `sale.product == product_id`, and
/// the result to `stores` on `sale.store == store.id`. No sale is ever
/// dropped.
#[must_use]
pub fn resolve_dimensions_for_sales(
    sales: &[Sale],
    products: &[BrandedProduct],
    stores: &[Store],
) -> Vec<EnrichedSale> {
    let product_index = index_by(products, |p| p.product_id);
    let (with_products, product_misses) = left_join(
        sales,
        products,
        &product_index,
        |s| Some(s.product),
        |s, p| EnrichedSale {
            date: s.date,
            product: s.product,
            store: s.store,
            quantity: s.quantity,
            product_name: p.map(|p| p.product_name.clone()),
            product_id: p.map(|p| p.product_id),
            brand_name: p.and_then(|p| p.brand_name.clone()),
            brand_id: p.and_then(|p| p.brand_id),
            store_name: None,
            store_city: None,
            store_id: None,
        },
    );

    let store_index = index_by(stores, |s| s.id);
    let (enriched, store_misses) = left_join(
        &with_products,
        stores,
        &store_index,
        |s| Some(s.store),
        |s, st| EnrichedSale {
            store_name: st.map(|st| st.name.clone()),
            store_city: st.map(|st| st.city.clone()),
            store_id: st.map(|st| st.id),
            ..s.clone()
        },
    );

    if product_misses > 0 || store_misses > 0 {
        warn!(product_misses, store_misses, "sales with unresolved dimensions");
    }
    info!(rows = enriched.len(), "enriched sales");
    enriched
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::tables::{InputPaths, Tables};

    fn sale(product: i64, store: i64, quantity: i64) -> Sale {
        Sale {
            date: SaleDate::from_str("2021-01-01").unwrap(),
            product,
            store,
            quantity,
        }
    }

    fn brand(name: &str, id: i64) -> Brand {
        Brand {
            name: name.into(),
            id,
        }
    }

    fn product(name: &str, brand: &str, id: i64) -> Product {
        Product {
            name: name.into(),
            brand: Some(brand.into()),
            id,
        }
    }

    #[test]
    fn resolve_brand_for_product_fn_joins_on_brand_name() {
        let branded = resolve_brand_for_product(
            &[product("Widget", "Acme", 7)],
            &[brand("Globex", 1), brand("Acme", 2)],
        );
        assert_eq!(
            branded,
            vec![BrandedProduct {
                product_name: "Widget".into(),
                product_brand_name: Some("Acme".into()),
                product_id: 7,
                brand_name: Some("Acme".into()),
                brand_id: Some(2),
            }]
        );
    }

    #[test]
    fn resolve_brand_for_product_fn_is_case_and_whitespace_sensitive() {
        let branded = resolve_brand_for_product(
            &[product("Widget", "acme", 1), product("Gadget", "Acme ", 2)],
            &[brand("Acme", 1)],
        );
        assert_eq!(branded.len(), 2);
        assert!(branded.iter().all(|p| p.brand_name.is_none()));
        assert!(branded.iter().all(|p| p.brand_id.is_none()));
    }

    #[test]
    fn resolve_brand_for_product_fn_keeps_products_without_brand() {
        let products = [Product {
            name: "Loose".into(),
            brand: None,
            id: 3,
        }];
        let branded = resolve_brand_for_product(&products, &[brand("Acme", 1)]);
        assert_eq!(branded[0].product_id, 3);
        assert_eq!(branded[0].brand_name, None);
    }

    #[test]
    fn resolve_brand_for_product_fn_fans_out_duplicate_brand_names() {
        let branded = resolve_brand_for_product(
            &[product("Widget", "Acme", 1)],
            &[brand("Acme", 1), brand("Acme", 2)],
        );
        let ids: Vec<_> = branded.iter().map(|p| p.brand_id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[test]
    fn resolve_dimensions_for_sales_fn_leaves_unknown_product_empty() {
        let products =
            resolve_brand_for_product(&[product("Widget", "Acme", 1)], &[brand("Acme", 5)]);
        let stores = [Store {
            name: "Downtown".into(),
            city: "Springfield".into(),
            id: 1,
        }];
        let enriched =
            resolve_dimensions_for_sales(&[sale(1, 1, 3), sale(99, 1, 4)], &products, &stores);
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].product_name.as_deref(), Some("Widget"));
        assert_eq!(enriched[0].brand_id, Some(5));
        assert_eq!(enriched[1].product_name, None);
        assert_eq!(enriched[1].product_id, None);
        assert_eq!(enriched[1].brand_name, None);
        assert_eq!(enriched[1].store_name.as_deref(), Some("Downtown"));
        assert_eq!(enriched[1].quantity, 4);
    }

    #[test]
    fn resolve_dimensions_for_sales_fn_leaves_unknown_store_empty() {
        let enriched = resolve_dimensions_for_sales(&[sale(1, 42, 3)], &[], &[]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].store_name, None);
        assert_eq!(enriched[0].store_city, None);
        assert_eq!(enriched[0].store_id, None);
    }

    #[test]
    fn resolve_dimensions_for_sales_fn_preserves_row_order_for_fixture_data() {
        let tables = Tables::load(&InputPaths::in_dir("testdata")).unwrap();
        let products = resolve_brand_for_product(&tables.products, &tables.brands);
        let enriched = resolve_dimensions_for_sales(&tables.sales, &products, &tables.stores);
        assert_eq!(enriched.len(), tables.sales.len());
        for (e, s) in enriched.iter().zip(&tables.sales) {
            assert_eq!(
                (e.date, e.product, e.store, e.quantity),
                (s.date, s.product, s.store, s.quantity)
            );
        }
        // Doohickey's brand "Umbrella" is not in brand.csv, and store 3 does not exist.
        let last = enriched.last().unwrap();
        assert_eq!(last.product_name.as_deref(), Some("Doohickey"));
        assert_eq!(last.brand_name, None);
        assert_eq!(last.store_name, None);
    }
}
