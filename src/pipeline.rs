//! Stage entry points and the sequential pipeline facade.

use crate::{
    batch::BatchProcessor,
    client::OpenAiClient,
    config::Config,
    dataset,
    retry::RetryPolicy,
    stage::{BrandStage, StageDriver, StageOutcome, ValidateStage},
    store::Row,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct BrandStageReport {
    pub total: usize,
    pub no_brand: usize,
    pub output: PathBuf,
    pub no_brand_output: PathBuf,
}

/// Run the brand-identification stage over `input`, then split out the
/// no-brand rows that feed the validation stage.
pub async fn run_brand_stage(cfg: &Config, input: &Path, fresh: bool) -> Result<BrandStageReport> {
    let data = dataset::read_dataset(input, &cfg.paths.search_term_column)?;
    info!("found {} search terms to process", data.rows.len());

    let processor = BatchProcessor::new(
        OpenAiClient::from_config(cfg).map_err(|e| anyhow!("{e}"))?,
        RetryPolicy::from_config(cfg),
        cfg.openai.clone(),
    );
    let mut driver = StageDriver::new(cfg, BrandStage { processor });

    let csv_folder = Path::new(&cfg.paths.csv_folder);
    ensure_dir(csv_folder)?;
    let output = csv_folder.join(&cfg.output.brand_filtered_filename);
    let outcome = driver.run(&data, &output, fresh).await?;

    if cfg.global.print_summary {
        println!("{}", driver.stats().performance_report());
    }

    let no_brand_output = csv_folder.join(&cfg.output.no_brand_filename);
    let no_brand = split_no_brand(&outcome, &no_brand_output)?;
    info!(
        "{} of {} products have no brand",
        no_brand,
        outcome.rows.len()
    );

    Ok(BrandStageReport {
        total: outcome.rows.len(),
        no_brand,
        output,
        no_brand_output,
    })
}

/// Write the rows labelled "no" brand to their own dataset. Nothing is
/// written when every row is branded.
fn split_no_brand(outcome: &StageOutcome, output: &Path) -> Result<usize> {
    let no_brand_rows: Vec<Row> = outcome
        .rows
        .iter()
        .filter(|row| {
            row.get("Brand")
                .is_some_and(|b| b.eq_ignore_ascii_case("no"))
        })
        .cloned()
        .collect();

    if no_brand_rows.is_empty() {
        info!("no products without brands found");
        return Ok(0);
    }

    dataset::write_dataset(output, &outcome.schema, &no_brand_rows)?;
    Ok(no_brand_rows.len())
}

/// Run the product-validation stage over `input` (normally the no-brand
/// output of the brand stage).
pub async fn run_validate_stage(cfg: &Config, input: &Path, fresh: bool) -> Result<usize> {
    if !input.exists() {
        return Err(anyhow!(
            "{} not found; run the brand stage first",
            input.display()
        ));
    }
    let data = dataset::read_dataset(input, &cfg.paths.search_term_column)?;
    info!("found {} products to assess", data.rows.len());

    let processor = BatchProcessor::new(
        OpenAiClient::from_config(cfg).map_err(|e| anyhow!("{e}"))?,
        RetryPolicy::from_config(cfg),
        cfg.openai.clone(),
    );
    let mut driver = StageDriver::new(cfg, ValidateStage { processor });

    let csv_folder = Path::new(&cfg.paths.csv_folder);
    ensure_dir(csv_folder)?;
    let output = csv_folder.join(&cfg.output.assessed_filename);
    let outcome = driver.run(&data, &output, fresh).await?;

    if cfg.global.print_summary {
        println!("{}", driver.stats().performance_report());
    }

    Ok(outcome.rows.len())
}

/// Run the full pipeline: brand identification, then product validation on
/// the no-brand subset.
pub async fn run_pipeline(cfg: &Config, input: &Path, fresh: bool) -> Result<()> {
    info!("pipeline step 1: brand identification");
    let brand = run_brand_stage(cfg, input, fresh)
        .await
        .with_context(|| "brand identification failed")?;

    if brand.no_brand == 0 {
        info!("pipeline finished early: no unbranded products to validate");
        return Ok(());
    }

    info!("pipeline step 2: product validation");
    let assessed = run_validate_stage(cfg, &brand.no_brand_output, fresh)
        .await
        .with_context(|| "product validation failed")?;

    info!(
        "pipeline complete: {} products labelled, {} assessed",
        brand.total, assessed
    );
    Ok(())
}
