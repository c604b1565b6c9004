use tracing::{debug, info};

use crate::{
    enrich::EnrichedSale,
    window::{
        group_rows, group_sum, grouped_rolling_mean_then_shift, grouped_shift, rolling_mean, shift,
    },
};

/// Width of every moving-average window.
pub const WINDOW: usize = 7;
/// Distance of every lag.
pub const LAG: usize = 7;

/// An enriched sale with its derived forecasting features.
///
/// `None` means the feature is undefined for this row: not enough earlier
/// rows, an undefined value inside the window, or a missing group key.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRow {
    pub sale: EnrichedSale,
    pub sales_product: i64,
    pub ma7_p: Option<f64>,
    pub lag7_p: Option<f64>,
    pub sales_brand: Option<i64>,
    pub ma7_b: Option<f64>,
    pub lag7_b: Option<f64>,
    pub sales_store: Option<i64>,
    pub ma7_s: Option<f64>,
    pub lag7_s: Option<f64>,
}

fn as_float(values: &[Option<i64>]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.map(|v| v as f64)).collect()
}

/// Derives the product, brand, and store features for `sales`, in their
/// current order.
///
/// Rows are never re-sorted by date, so the output depends on the input
/// order. Windowing is deliberately not uniform across features:
///
/// * `MA7_P`, `LAG7_P`, and `MA7_B` run over the whole table.
/// * `LAG7_B` runs within each (brand, store) group.
/// * `MA7_S` and `LAG7_S` run within each store group, except that the
///   one-row lag of `MA7_S` carries over from one store group to the next
///   (see [`grouped_rolling_mean_then_shift`]).
#[must_use]
pub fn derive_features(sales: Vec<EnrichedSale>) -> Vec<FeatureRow> {
    let quantities: Vec<i64> = sales.iter().map(|s| s.quantity).collect();

    let sales_product: Vec<Option<f64>> = quantities.iter().map(|&q| Some(q as f64)).collect();
    let ma7_p = shift(&rolling_mean(&sales_product, WINDOW), 1);
    let lag7_p = shift(&sales_product, LAG);

    let brand_day = group_rows(
        sales
            .iter()
            .map(|s| Some((s.brand_name.as_deref()?, s.store_name.as_deref()?, s.date))),
    );
    let sales_brand = group_sum(&brand_day, &quantities);
    let ma7_b = shift(&rolling_mean(&as_float(&sales_brand), WINDOW), 1);
    let brand_store = group_rows(
        sales
            .iter()
            .map(|s| Some((s.brand_name.as_deref()?, s.store_name.as_deref()?))),
    );
    let lag7_b = grouped_shift(&brand_store, &as_float(&sales_brand), LAG);

    let store_day = group_rows(sales.iter().map(|s| Some((s.store_name.as_deref()?, s.date))));
    let sales_store = group_sum(&store_day, &quantities);
    let store = group_rows(sales.iter().map(|s| s.store_name.as_deref()));
    let ma7_s = grouped_rolling_mean_then_shift(&store, &as_float(&sales_store), WINDOW, 1);
    let lag7_s = grouped_shift(&store, &as_float(&sales_store), LAG);

    debug!(
        brand_days = brand_day.len(),
        brand_stores = brand_store.len(),
        store_days = store_day.len(),
        stores = store.len(),
        "grouped sales"
    );

    let rows: Vec<FeatureRow> = sales
        .into_iter()
        .enumerate()
        .map(|(i, sale)| FeatureRow {
            sale,
            sales_product: quantities[i],
            ma7_p: ma7_p[i],
            lag7_p: lag7_p[i],
            sales_brand: sales_brand[i],
            ma7_b: ma7_b[i],
            lag7_b: lag7_b[i],
            sales_store: sales_store[i],
            ma7_s: ma7_s[i],
            lag7_s: lag7_s[i],
        })
        .collect();
    info!(rows = rows.len(), "derived features");
    rows
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::date::SaleDate;

    fn day(n: u32) -> SaleDate {
        SaleDate::from_str(&format!("2021-01-{n:02}")).unwrap()
    }

    fn sale(
        date: SaleDate,
        brand: Option<&str>,
        store: Option<&str>,
        quantity: i64,
    ) -> EnrichedSale {
        EnrichedSale {
            date,
            product: 1,
            store: 1,
            quantity,
            product_name: Some("Widget".into()),
            product_id: Some(1),
            brand_name: brand.map(Into::into),
            brand_id: brand.map(|_| 1),
            store_name: store.map(Into::into),
            store_city: store.map(|_| "Springfield".into()),
            store_id: store.map(|_| 1),
        }
    }

    #[test]
    fn derive_features_fn_computes_product_features_for_ten_steady_days() {
        let sales = (1..=10)
            .map(|d| sale(day(d), Some("Acme"), Some("S1"), 10))
            .collect();
        let rows = derive_features(sales);
        assert_eq!(rows[9].ma7_p, Some(10.0));
        assert_eq!(rows[9].lag7_p, Some(10.0));
        assert_eq!(rows[7].ma7_p, Some(10.0), "8th row is the first defined average");
        assert!(rows[..7].iter().all(|r| r.ma7_p.is_none() && r.lag7_p.is_none()));
    }

    #[test]
    fn derive_features_fn_ma7_p_is_mean_of_previous_seven_rows() {
        let quantities = [3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8];
        let sales = quantities
            .iter()
            .enumerate()
            .map(|(i, &q)| sale(day(i as u32 + 1), Some("Acme"), Some("S1"), q))
            .collect();
        let rows = derive_features(sales);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.sales_product, quantities[i]);
            if i >= 7 {
                let mean = quantities[i - 7..i].iter().sum::<i64>() as f64 / 7.0;
                assert!((row.ma7_p.unwrap() - mean).abs() < 1e-12, "row {i}");
                assert_eq!(row.lag7_p, Some(quantities[i - 7] as f64), "row {i}");
            } else {
                assert_eq!(row.ma7_p, None, "row {i}");
                assert_eq!(row.lag7_p, None, "row {i}");
            }
        }
    }

    #[test]
    fn derive_features_fn_product_windows_ignore_store_boundaries() {
        // Four rows in store A followed by four in store B: MA7_P and LAG7_P
        // still reach back across the store change.
        let mut sales: Vec<_> = (1..=4)
            .map(|d| sale(day(d), Some("Acme"), Some("A"), 1))
            .collect();
        sales.extend((1..=4).map(|d| sale(day(d), Some("Acme"), Some("B"), 8)));
        let rows = derive_features(sales);
        assert_eq!(rows[7].lag7_p, Some(1.0));
        assert_eq!(rows[7].ma7_p, Some((4.0 + 8.0 * 3.0) / 7.0));
        assert_eq!(rows[7].lag7_s, None, "LAG7_S stays within store B");
    }

    #[test]
    fn derive_features_fn_sums_brand_and_store_sales_per_day() {
        let sales = vec![
            sale(day(1), Some("Acme"), Some("S1"), 2),
            sale(day(1), Some("Acme"), Some("S1"), 3),
            sale(day(1), Some("Globex"), Some("S1"), 4),
            sale(day(2), Some("Acme"), Some("S1"), 5),
            sale(day(1), Some("Acme"), Some("S2"), 6),
        ];
        let rows = derive_features(sales);
        let brand: Vec<_> = rows.iter().map(|r| r.sales_brand).collect();
        assert_eq!(brand, vec![Some(5), Some(5), Some(4), Some(5), Some(6)]);
        let store: Vec<_> = rows.iter().map(|r| r.sales_store).collect();
        assert_eq!(store, vec![Some(9), Some(9), Some(9), Some(5), Some(6)]);
    }

    #[test]
    fn derive_features_fn_keeps_times_of_day_apart_when_summing() {
        let morning = SaleDate::from_str("2021-05-30 09:00:00").unwrap();
        let afternoon = SaleDate::from_str("2021-05-30 13:45:00").unwrap();
        let rows = derive_features(vec![
            sale(morning, Some("Acme"), Some("S1"), 2),
            sale(afternoon, Some("Acme"), Some("S1"), 3),
        ]);
        let brand: Vec<_> = rows.iter().map(|r| r.sales_brand).collect();
        assert_eq!(brand, vec![Some(2), Some(3)]);
        let store: Vec<_> = rows.iter().map(|r| r.sales_store).collect();
        assert_eq!(store, vec![Some(2), Some(3)]);
    }

    #[test]
    fn derive_features_fn_brand_sum_is_independent_of_order_within_group() {
        let forward = vec![
            sale(day(1), Some("Acme"), Some("S1"), 2),
            sale(day(1), Some("Acme"), Some("S1"), 7),
        ];
        let reversed: Vec<_> = forward.iter().cloned().rev().collect();
        let a = derive_features(forward);
        let b = derive_features(reversed);
        assert_eq!(a[0].sales_brand, Some(9));
        assert_eq!(b[0].sales_brand, Some(9));
    }

    #[test]
    fn derive_features_fn_leaves_group_features_empty_without_keys() {
        let sales = vec![
            sale(day(1), None, Some("S1"), 2),
            sale(day(1), Some("Acme"), None, 3),
        ];
        let rows = derive_features(sales);
        assert_eq!(rows[0].sales_brand, None);
        assert_eq!(rows[0].sales_store, Some(2));
        assert_eq!(rows[1].sales_brand, None);
        assert_eq!(rows[1].sales_store, None);
        assert_eq!(rows[1].ma7_s, None);
    }

    #[test]
    fn derive_features_fn_lag7_b_and_lag7_s_are_grouped() {
        // Interleave two stores day by day; each store sees only its own rows.
        let mut sales = Vec::new();
        for d in 1..=8 {
            sales.push(sale(day(d), Some("Acme"), Some("A"), i64::from(d)));
            sales.push(sale(day(d), Some("Acme"), Some("B"), 100 + i64::from(d)));
        }
        let rows = derive_features(sales);
        // Row 14 is store A on day 8; its 7th earlier A row is day 1.
        assert_eq!(rows[14].lag7_b, Some(1.0));
        assert_eq!(rows[14].lag7_s, Some(1.0));
        assert_eq!(rows[15].lag7_b, Some(101.0));
        assert_eq!(rows[15].lag7_s, Some(101.0));
        // LAG7_P is positional: row 14 looks back to row 7 (store B, day 4).
        assert_eq!(rows[14].lag7_p, Some(104.0));
    }

    #[test]
    fn derive_features_fn_ma7_b_is_whole_table_but_ma7_s_is_per_store() {
        let mut sales = Vec::new();
        for d in 1..=8 {
            sales.push(sale(day(d), Some("Acme"), Some("A"), 1));
        }
        for d in 1..=8 {
            sales.push(sale(day(d), Some("Acme"), Some("B"), 50));
        }
        let rows = derive_features(sales);
        // Row 8 (first B row): MA7_B spans rows 1..=7, all store A.
        assert_eq!(rows[8].ma7_b, Some(1.0));
        // Store A's last rolling mean carries into B's first row.
        assert_eq!(rows[8].ma7_s, Some(1.0));
        // Store B's own windows fill from its seventh row, lagged by one.
        assert_eq!(rows[14].ma7_s, None);
        assert_eq!(rows[15].ma7_s, Some(50.0));
        // Store A's eighth row sees its own first seven.
        assert_eq!(rows[7].ma7_s, Some(1.0));
        assert_eq!(rows[0].ma7_s, None);
    }
}
