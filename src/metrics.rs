use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, warn};

use std::collections::BTreeMap;

use crate::{date::SaleDate, features::FeatureRow};

/// A feature row with its error against the product moving average.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorRow {
    pub row: FeatureRow,
    pub abs_error: Option<f64>,
    /// `None` when `MA7_P` is undefined. Infinite or NaN when the row sold
    /// nothing.
    pub wmape: Option<f64>,
}

/// Defines the CSV format for the error report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WmapeResult {
    pub product_id: Option<i64>,
    pub store_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub wmape: f64,
}

/// How the error report is ranked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum RankBy {
    /// One entry per sale row, as the feature table has them.
    #[default]
    Rows,
    /// One entry per (product, store, brand), holding its mean WMAPE.
    KeyMean,
}

/// Keeps rows dated within `min..=max`, in their original order.
#[must_use]
pub fn filter_window(rows: Vec<FeatureRow>, min: SaleDate, max: SaleDate) -> Vec<FeatureRow> {
    let before = rows.len();
    let kept: Vec<_> = rows
        .into_iter()
        .filter(|r| (min..=max).contains(&r.sale.date))
        .collect();
    debug!(before, after = kept.len(), %min, %max, "filtered to date window");
    kept
}

/// Computes `|sales_product - MA7_P|` and the WMAPE `abs_error / |sales_product|`.
///
/// A zero `sales_product` gives a non-finite WMAPE rather than an error.
#[must_use]
pub fn compute_error(row: FeatureRow) -> ErrorRow {
    let actual = row.sales_product as f64;
    let abs_error = row.ma7_p.map(|ma| (actual - ma).abs());
    let wmape = abs_error.map(|e| e / actual.abs());
    ErrorRow {
        row,
        abs_error,
        wmape,
    }
}

/// Mean WMAPE per (product, store, brand) key, in ascending key order.
///
/// Undefined WMAPEs are skipped; a key with none gets NaN. Rows missing any
/// of the three ids are left out.
#[must_use]
pub fn mean_wmape_by_key(rows: &[ErrorRow]) -> Vec<WmapeResult> {
    let mut sums: BTreeMap<(i64, i64, i64), (f64, usize)> = BTreeMap::new();
    for r in rows {
        let sale = &r.row.sale;
        let (Some(product_id), Some(store_id), Some(brand_id)) =
            (sale.product_id, sale.store_id, sale.brand_id)
        else {
            continue;
        };
        let entry = sums.entry((product_id, store_id, brand_id)).or_default();
        if let Some(w) = r.wmape.filter(|w| !w.is_nan()) {
            entry.0 += w;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|((product_id, store_id, brand_id), (sum, n))| WmapeResult {
            product_id: Some(product_id),
            store_id: Some(store_id),
            brand_id: Some(brand_id),
            wmape: if n == 0 { f64::NAN } else { sum / n as f64 },
        })
        .collect()
}

fn keep_top(mut results: Vec<WmapeResult>, top_n: usize) -> Vec<WmapeResult> {
    let before = results.len();
    results.retain(|r| r.wmape.is_finite());
    if results.len() < before {
        warn!(
            dropped = before - results.len(),
            "left out non-finite WMAPE values"
        );
    }
    // Stable: ties keep their original order.
    results.sort_by(|a, b| b.wmape.total_cmp(&a.wmape));
    results.truncate(top_n);
    results
}

/// The `top_n` rows with the highest finite WMAPE, highest first.
///
/// This ranks individual rows, not per-key aggregates: a product, store,
/// and brand combination can appear several times.
#[must_use]
pub fn rank_top_n(rows: &[ErrorRow], top_n: usize) -> Vec<WmapeResult> {
    let results = rows
        .iter()
        .filter_map(|r| {
            let sale = &r.row.sale;
            Some(WmapeResult {
                product_id: sale.product_id,
                store_id: sale.store_id,
                brand_id: sale.brand_id,
                wmape: r.wmape?,
            })
        })
        .collect();
    keep_top(results, top_n)
}

/// Builds the error report according to `rank_by`.
#[must_use]
pub fn rank(rows: &[ErrorRow], top: usize, rank_by: RankBy) -> Vec<WmapeResult> {
    match rank_by {
        RankBy::Rows => rank_top_n(rows, top),
        RankBy::KeyMean => keep_top(mean_wmape_by_key(rows), top),
    }
}
