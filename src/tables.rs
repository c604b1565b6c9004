use serde::{de::DeserializeOwned, Deserialize};
use tracing::info;

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use crate::{
    date::SaleDate,
    error::{Error, Result},
};

/// Defines the CSV format for the brand dimension.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Brand {
    pub name: String,
    pub id: i64,
}

/// Defines the CSV format for the product dimension.
///
/// `brand` holds the brand's *name*, not its id.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Product {
    pub name: String,
    pub brand: Option<String>,
    pub id: i64,
}

/// Defines the CSV format for the store dimension.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Store {
    pub name: String,
    pub city: String,
    pub id: i64,
}

/// Defines the CSV format for sales data: one row per observed
/// product, store, and day.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Sale {
    pub date: SaleDate,
    pub product: i64,
    pub store: i64,
    pub quantity: i64,
}

const BRAND_COLUMNS: &[&str] = &["name", "id"];
const PRODUCT_COLUMNS: &[&str] = &["name", "brand", "id"];
const STORE_COLUMNS: &[&str] = &["name", "city", "id"];
const SALES_COLUMNS: &[&str] = &["date", "product", "store", "quantity"];

/// Locations of the four input files.
#[derive(Clone, Debug)]
pub struct InputPaths {
    pub brands: PathBuf,
    pub products: PathBuf,
    pub stores: PathBuf,
    pub sales: PathBuf,
}

impl InputPaths {
    /// Uses the conventional file names `brand.csv`, `product.csv`,
    /// `store.csv`, and `sales.csv` inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            brands: dir.join("brand.csv"),
            products: dir.join("product.csv"),
            stores: dir.join("store.csv"),
            sales: dir.join("sales.csv"),
        }
    }
}

/// The four input tables, in file order.
#[derive(Debug, Default)]
pub struct Tables {
    pub brands: Vec<Brand>,
    pub products: Vec<Product>,
    pub stores: Vec<Store>,
    pub sales: Vec<Sale>,
}

impl Tables {
    /// Reads all four input tables.
    ///
    /// # Errors
    ///
    /// Returns the first error from any of [`read_brands`], [`read_products`],
    /// [`read_stores`], or [`read_sales`].
    pub fn load(paths: &InputPaths) -> Result<Self> {
        let tables = Self {
            brands: read_brands(&paths.brands)?,
            products: read_products(&paths.products)?,
            stores: read_stores(&paths.stores)?,
            sales: read_sales(&paths.sales)?,
        };
        info!(
            brands = tables.brands.len(),
            products = tables.products.len(),
            stores = tables.stores.len(),
            sales = tables.sales.len(),
            "loaded input tables"
        );
        Ok(tables)
    }
}

/// Reads the brand table (`name,id`) from `path`.
///
/// # Errors
///
/// Returns errors if:
/// * The file does not exist ([`Error::InputNotFound`])
/// * The header lacks an expected column ([`Error::SchemaMismatch`])
/// * A row cannot be parsed ([`Error::Csv`])
pub fn read_brands(path: impl AsRef<Path>) -> Result<Vec<Brand>> {
    read_table(path.as_ref(), BRAND_COLUMNS)
}

/// Reads the product table (`name,brand,id`) from `path`.
///
/// # Errors
///
/// As for [`read_brands`].
pub fn read_products(path: impl AsRef<Path>) -> Result<Vec<Product>> {
    read_table(path.as_ref(), PRODUCT_COLUMNS)
}

/// Reads the store table (`name,city,id`) from `path`.
///
/// # Errors
///
/// As for [`read_brands`].
pub fn read_stores(path: impl AsRef<Path>) -> Result<Vec<Store>> {
    read_table(path.as_ref(), STORE_COLUMNS)
}

/// Reads the sales table (`date,product,store,quantity`) from `path`, in
/// file order. Rows are not sorted.
///
/// # Errors
///
/// As for [`read_brands`]. A `date` that is not an ISO date, or a
/// `quantity` that is empty or not a whole number (`2.5` included), is an
/// [`Error::Csv`] error: quantities are never read as missing or rounded.
pub fn read_sales(path: impl AsRef<Path>) -> Result<Vec<Sale>> {
    read_table(path.as_ref(), SALES_COLUMNS)
}

fn read_table<T: DeserializeOwned>(path: &Path, columns: &[&'static str]) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
        _ => Error::io(path, e),
    })?;
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers().map_err(|e| Error::csv(path, e))?;
    if let Some(&column) = columns.iter().find(|c| !headers.iter().any(|h| h == **c)) {
        return Err(Error::SchemaMismatch {
            path: path.to_path_buf(),
            column,
        });
    }
    rdr.deserialize()
        .map(|result| result.map_err(|e| Error::csv(path, e)))
        .collect()
}
