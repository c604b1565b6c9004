use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forecast_features::{run, Config, InputPaths, Preview, RankBy, SaleDate};

use std::path::PathBuf;

/// Derives sales forecasting features and WMAPE rankings from CSV files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Start date of the report window (YYYY-MM-DD)
    #[arg(long, default_value = "2021-01-08")]
    min_date: SaleDate,
    /// End date of the report window (YYYY-MM-DD)
    #[arg(long, default_value = "2021-05-30")]
    max_date: SaleDate,
    /// Number of rows in the WMAPE report and the console preview
    #[arg(long, default_value_t = 5)]
    top: usize,
    /// Directory holding brand.csv, product.csv, store.csv, and sales.csv
    #[arg(long, default_value = "./input_data/data")]
    data_dir: PathBuf,
    /// Where to write the feature table
    #[arg(long, default_value = "features.csv")]
    features_out: PathBuf,
    /// Where to write the WMAPE report
    #[arg(long, default_value = "mapes.csv")]
    mapes_out: PathBuf,
    /// Rank individual rows, or the mean WMAPE of each product/store/brand
    #[arg(long, value_enum, default_value_t = RankBy::Rows)]
    rank_by: RankBy,
    /// Skip printing the reports to the console
    #[arg(long)]
    no_preview: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config {
        inputs: InputPaths::in_dir(&cli.data_dir),
        min_date: cli.min_date,
        max_date: cli.max_date,
        top_n: cli.top,
        rank_by: cli.rank_by,
        features_out: cli.features_out,
        mapes_out: cli.mapes_out,
    };
    run(&config).with_context(|| format!("processing {}", cli.data_dir.display()))?;
    if !cli.no_preview {
        let preview = Preview::read(&config.features_out, &config.mapes_out, config.top_n)
            .context("reading reports back for preview")?;
        print!("{preview}");
    }
    Ok(())
}
