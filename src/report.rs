use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use std::{fmt::Display, path::Path};

use crate::{
    date::SaleDate,
    error::{Error, Result},
    features::FeatureRow,
    metrics::WmapeResult,
};

/// Column order of `features.csv`.
pub const FEATURE_COLUMNS: [&str; 13] = [
    "product_id",
    "store_id",
    "brand_id",
    "date",
    "sales_product",
    "MA7_P",
    "LAG7_P",
    "sales_brand",
    "MA7_B",
    "LAG7_B",
    "sales_store",
    "MA7_S",
    "LAG7_S",
];

/// Column order of `mapes.csv`.
pub const MAPE_COLUMNS: [&str; 4] = ["product_id", "store_id", "brand_id", "wmape"];

/// Defines the CSV format for the feature table.
///
/// Undefined values are written as empty fields.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub product_id: Option<i64>,
    pub store_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub date: SaleDate,
    pub sales_product: i64,
    #[serde(rename = "MA7_P")]
    pub ma7_p: Option<f64>,
    #[serde(rename = "LAG7_P")]
    pub lag7_p: Option<f64>,
    pub sales_brand: Option<i64>,
    #[serde(rename = "MA7_B")]
    pub ma7_b: Option<f64>,
    #[serde(rename = "LAG7_B")]
    pub lag7_b: Option<f64>,
    pub sales_store: Option<i64>,
    #[serde(rename = "MA7_S")]
    pub ma7_s: Option<f64>,
    #[serde(rename = "LAG7_S")]
    pub lag7_s: Option<f64>,
}

impl From<&FeatureRow> for FeatureRecord {
    fn from(row: &FeatureRow) -> Self {
        Self {
            product_id: row.sale.product_id,
            store_id: row.sale.store_id,
            brand_id: row.sale.brand_id,
            date: row.sale.date,
            sales_product: row.sales_product,
            ma7_p: row.ma7_p,
            lag7_p: row.lag7_p,
            sales_brand: row.sales_brand,
            ma7_b: row.ma7_b,
            lag7_b: row.lag7_b,
            sales_store: row.sales_store,
            ma7_s: row.ma7_s,
            lag7_s: row.lag7_s,
        }
    }
}

fn write_table<T: Serialize>(
    path: &Path,
    columns: &[&str],
    records: impl IntoIterator<Item = T>,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;
    wtr.write_record(columns).map_err(|e| Error::csv(path, e))?;
    let mut rows = 0;
    for record in records {
        wtr.serialize(record).map_err(|e| Error::csv(path, e))?;
        rows += 1;
    }
    wtr.flush().map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), rows, "wrote report");
    Ok(())
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<(Vec<String>, Vec<T>)> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| Error::csv(path, e))?;
    let headers = rdr
        .headers()
        .map_err(|e| Error::csv(path, e))?
        .iter()
        .map(String::from)
        .collect();
    let records = rdr
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::csv(path, e))?;
    Ok((headers, records))
}

/// Writes the feature table to `path`, in row order.
///
/// # Errors
///
/// Returns any errors from creating or writing the CSV file.
pub fn write_features(path: impl AsRef<Path>, rows: &[FeatureRow]) -> Result<()> {
    write_table(
        path.as_ref(),
        &FEATURE_COLUMNS,
        rows.iter().map(FeatureRecord::from),
    )
}

/// Writes the error report to `path`.
///
/// # Errors
///
/// Returns any errors from creating or writing the CSV file.
pub fn write_mapes(path: impl AsRef<Path>, results: &[WmapeResult]) -> Result<()> {
    write_table(path.as_ref(), &MAPE_COLUMNS, results)
}

/// Reads a feature table written by [`write_features`].
///
/// # Errors
///
/// Returns any errors from opening or parsing the CSV file.
pub fn read_features(path: impl AsRef<Path>) -> Result<Vec<FeatureRecord>> {
    Ok(read_table(path.as_ref())?.1)
}

/// A preview value that cannot be shown as a whole number.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("skipped row {row}: {column} has no integer value")]
pub struct CastFailure {
    pub row: usize,
    pub column: &'static str,
}

/// Values the preview shows as whole numbers.
trait AsCount {
    fn as_count(&self) -> Option<i64>;
}

impl AsCount for i64 {
    fn as_count(&self) -> Option<i64> {
        Some(*self)
    }
}

impl AsCount for Option<i64> {
    fn as_count(&self) -> Option<i64> {
        *self
    }
}

impl AsCount for Option<f64> {
    fn as_count(&self) -> Option<i64> {
        self.filter(|v| v.is_finite()).map(|v| v.trunc() as i64)
    }
}

fn count(
    row: usize,
    column: &'static str,
    value: &impl AsCount,
) -> std::result::Result<i64, CastFailure> {
    value.as_count().ok_or(CastFailure { row, column })
}

/// Formats a float the way the preview has always shown them: `10.0`,
/// `1.4285714285714286`, `1e-07`, `1e+16`, or `nan`.
fn float(value: Option<f64>) -> String {
    match value {
        None => "nan".into(),
        Some(v) if v.is_nan() => "nan".into(),
        Some(v) if v.is_infinite() => (if v > 0.0 { "inf" } else { "-inf" }).into(),
        Some(v) => {
            let shortest = format!("{v:?}");
            match shortest.split_once('e') {
                // Exponents carry a sign and at least two digits.
                Some((mantissa, exp)) => {
                    let (sign, digits) = match exp.strip_prefix('-') {
                        Some(digits) => ('-', digits),
                        None => ('+', exp),
                    };
                    format!("{mantissa}e{sign}{digits:0>2}")
                }
                None => shortest,
            }
        }
    }
}

/// One preview row: the formatted line, or why it was left out.
pub type Line = std::result::Result<String, CastFailure>;

fn feature_line(row: usize, r: &FeatureRecord) -> Line {
    Ok(format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{}",
        count(row, "product_id", &r.product_id)?,
        count(row, "store_id", &r.store_id)?,
        count(row, "brand_id", &r.brand_id)?,
        r.date,
        count(row, "sales_product", &r.sales_product)?,
        float(r.ma7_p),
        count(row, "LAG7_P", &r.lag7_p)?,
        count(row, "sales_brand", &r.sales_brand)?,
        float(r.ma7_b),
        count(row, "LAG7_B", &r.lag7_b)?,
        count(row, "sales_store", &r.sales_store)?,
        float(r.ma7_s),
        count(row, "LAG7_S", &r.lag7_s)?,
    ))
}

fn mape_line(row: usize, r: &MapeRecord) -> Line {
    Ok(format!(
        "{},{},{},{}",
        count(row, "product_id", &r.product_id)?,
        count(row, "store_id", &r.store_id)?,
        count(row, "brand_id", &r.brand_id)?,
        float(Some(r.wmape)),
    ))
}

/// Reading side of [`WmapeResult`].
#[derive(Debug, Deserialize)]
struct MapeRecord {
    product_id: Option<i64>,
    store_id: Option<i64>,
    brand_id: Option<i64>,
    wmape: f64,
}

/// The first rows of one written report.
#[derive(Debug)]
pub struct PreviewTable {
    pub title: String,
    pub headers: Vec<String>,
    pub lines: Vec<Line>,
}

impl PreviewTable {
    fn read<T: DeserializeOwned>(
        title: String,
        path: &Path,
        top_n: usize,
        line: fn(usize, &T) -> Line,
    ) -> Result<Self> {
        let (headers, records): (_, Vec<T>) = read_table(path)?;
        let lines: Vec<Line> = records
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(i, r)| line(i, r))
            .collect();
        for failure in lines.iter().filter_map(|l| l.as_ref().err()) {
            warn!(path = %path.display(), %failure, "preview row not shown");
        }
        Ok(Self {
            title,
            headers,
            lines,
        })
    }
}

impl Display for PreviewTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n --{}--", self.title)?;
        let quoted: Vec<_> = self.headers.iter().map(|h| format!("'{h}'")).collect();
        writeln!(f, "[{}]", quoted.join(", "))?;
        for line in &self.lines {
            match line {
                Ok(line) => writeln!(f, "{line}")?,
                Err(failure) => writeln!(f, "# {failure}")?,
            }
        }
        Ok(())
    }
}

/// A console preview of both reports, read back from the written files.
///
/// To get a printable version of the preview, use its [`Display`] implementation.
#[derive(Debug)]
pub struct Preview {
    pub features: PreviewTable,
    pub mapes: PreviewTable,
}

impl Preview {
    /// Reads up to `top_n` rows of each report.
    ///
    /// Rows with a missing or non-finite value in a whole-number column are
    /// reported as [`CastFailure`]s rather than shown.
    ///
    /// # Errors
    ///
    /// Returns any errors from opening or parsing either CSV file.
    pub fn read(features: impl AsRef<Path>, mapes: impl AsRef<Path>, top_n: usize) -> Result<Self> {
        let (features, mapes) = (features.as_ref(), mapes.as_ref());
        Ok(Self {
            features: PreviewTable::read::<FeatureRecord>(
                format!("Output1 to be written to: {}", file_name(features)),
                features,
                top_n,
                feature_line,
            )?,
            mapes: PreviewTable::read::<MapeRecord>(
                format!("Output2 to be written to: {}", file_name(mapes)),
                mapes,
                top_n,
                mape_line,
            )?,
        })
    }

    /// Number of rows left out of the preview.
    #[must_use]
    pub fn skipped(&self) -> usize {
        [&self.features, &self.mapes]
            .iter()
            .flat_map(|t| &t.lines)
            .filter(|l| l.is_err())
            .count()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

impl Display for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.features, self.mapes)
    }
}
