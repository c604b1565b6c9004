#![doc = include_str!("../README.md")]
use tracing::{info, warn};

use std::path::PathBuf;

pub mod date;
pub mod enrich;
pub mod error;
pub mod features;
pub mod metrics;
pub mod report;
pub mod tables;
pub mod window;

pub use date::SaleDate;
pub use error::{Error, Result};
pub use metrics::RankBy;
pub use report::Preview;
pub use tables::{InputPaths, Tables};

/// Everything one run of the pipeline needs.
#[derive(Clone, Debug)]
pub struct Config {
    pub inputs: InputPaths,
    pub min_date: SaleDate,
    pub max_date: SaleDate,
    pub top_n: usize,
    pub rank_by: RankBy,
    pub features_out: PathBuf,
    pub mapes_out: PathBuf,
}

/// Row counts of the reports written by [`run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub features: usize,
    pub mapes: usize,
}

/// Loads the inputs, derives features, and writes both reports.
///
/// Features are derived over the full sales history, in file order, and only
/// then restricted to the `min_date..=max_date` window. A window with
/// `min_date` after `max_date` selects nothing, so both reports are written
/// with their header row only.
///
/// # Errors
///
/// Returns errors if:
/// * An input file is missing, lacks a column, or has a malformed row
/// * An output file cannot be written
pub fn run(config: &Config) -> Result<Summary> {
    if config.min_date > config.max_date {
        warn!(min = %config.min_date, max = %config.max_date, "date window is empty");
    }
    let tables = Tables::load(&config.inputs)?;

    let products = enrich::resolve_brand_for_product(&tables.products, &tables.brands);
    let sales = enrich::resolve_dimensions_for_sales(&tables.sales, &products, &tables.stores);
    let rows = features::derive_features(sales);
    let rows = metrics::filter_window(rows, config.min_date, config.max_date);
    report::write_features(&config.features_out, &rows)?;

    let errors: Vec<_> = rows.into_iter().map(metrics::compute_error).collect();
    let results = metrics::rank(&errors, config.top_n, config.rank_by);
    report::write_mapes(&config.mapes_out, &results)?;

    let summary = Summary {
        features: errors.len(),
        mapes: results.len(),
    };
    info!(?summary, "pipeline finished");
    Ok(summary)
}
