//! Stage driver: resume-or-fresh decision, sequential batch loop, durable
//! checkpointing, and final dataset assembly for one pipeline stage.

use crate::{
    batch::BatchProcessor,
    client::CompletionClient,
    config::Config,
    dataset::{self, Dataset},
    error::AiError,
    parse::ERROR_API,
    stats::StageStats,
    store::{Row, StageStore},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// One pipeline stage's identity and per-batch transform.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> &'static str;

    /// Columns this stage derives, in output order.
    fn derived_fields(&self) -> &'static [&'static str];

    /// Input columns carried through the batch loop but removed from the
    /// final output.
    fn drop_in_final(&self) -> &'static [&'static str] {
        &[]
    }

    /// Transform a batch of search terms into rows holding the term column
    /// plus the derived fields, aligned positionally with `terms`.
    async fn process_batch(
        &self,
        terms: &[String],
        term_column: &str,
        stats: &mut StageStats,
    ) -> Result<Vec<Row>, AiError>;

    /// Sentinel row substituted when a batch fails even after retries.
    fn fallback_row(&self, term: &str, term_column: &str) -> Row;
}

/// Brand-identification stage: derives a single `Brand` column.
pub struct BrandStage<C: CompletionClient> {
    pub processor: BatchProcessor<C>,
}

#[async_trait]
impl<C: CompletionClient> Stage for BrandStage<C> {
    fn id(&self) -> &'static str {
        "brand_identifier"
    }

    fn derived_fields(&self) -> &'static [&'static str] {
        &["Brand"]
    }

    async fn process_batch(
        &self,
        terms: &[String],
        term_column: &str,
        stats: &mut StageStats,
    ) -> Result<Vec<Row>, AiError> {
        let records = self.processor.process_brand_batch(terms, stats).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                let mut row = Row::new();
                row.insert(term_column.to_string(), r.search_term);
                row.insert("Brand".to_string(), r.brand);
                row
            })
            .collect())
    }

    fn fallback_row(&self, term: &str, term_column: &str) -> Row {
        let mut row = Row::new();
        row.insert(term_column.to_string(), term.to_string());
        row.insert("Brand".to_string(), ERROR_API.to_string());
        row
    }
}

/// Product-validation stage: derives the seven viability-rating columns and
/// drops the `Brand` column inherited from the brand stage's output.
pub struct ValidateStage<C: CompletionClient> {
    pub processor: BatchProcessor<C>,
}

pub const RATING_FIELDS: [&str; 7] = [
    "Seasonal",
    "Specificity",
    "Commodity",
    "Subscribe&Save",
    "Gated",
    "Electronics_Batteries",
    "Insurance_Gov",
];

#[async_trait]
impl<C: CompletionClient> Stage for ValidateStage<C> {
    fn id(&self) -> &'static str {
        "product_validator"
    }

    fn derived_fields(&self) -> &'static [&'static str] {
        &RATING_FIELDS
    }

    fn drop_in_final(&self) -> &'static [&'static str] {
        &["Brand"]
    }

    async fn process_batch(
        &self,
        terms: &[String],
        term_column: &str,
        stats: &mut StageStats,
    ) -> Result<Vec<Row>, AiError> {
        let records = self.processor.process_rating_batch(terms, stats).await?;
        Ok(terms
            .iter()
            .zip(records)
            .map(|(term, r)| {
                let mut row = Row::new();
                row.insert(term_column.to_string(), term.clone());
                row.insert("Seasonal".to_string(), r.seasonal.to_string());
                row.insert("Specificity".to_string(), r.specificity.to_string());
                row.insert("Commodity".to_string(), r.commodity.to_string());
                row.insert("Subscribe&Save".to_string(), r.subscribe_save.to_string());
                row.insert("Gated".to_string(), r.gated.to_string());
                row.insert(
                    "Electronics_Batteries".to_string(),
                    r.electronics_batteries.to_string(),
                );
                row.insert("Insurance_Gov".to_string(), r.insurance_gov.to_string());
                row
            })
            .collect())
    }

    fn fallback_row(&self, term: &str, term_column: &str) -> Row {
        let mut row = Row::new();
        row.insert(term_column.to_string(), term.to_string());
        let default = crate::parse::RatingRecord::DEFAULT;
        for (field, value) in RATING_FIELDS.iter().zip([
            default.seasonal,
            default.specificity,
            default.commodity,
            default.subscribe_save,
            default.gated,
            default.electronics_batteries,
            default.insurance_gov,
        ]) {
            row.insert(field.to_string(), value.to_string());
        }
        row
    }
}

/// Final dataset of a completed stage, in declared column order.
pub struct StageOutcome {
    pub schema: Vec<String>,
    pub rows: Vec<Row>,
}

pub struct StageDriver<'a, S: Stage> {
    cfg: &'a Config,
    stage: S,
    store: StageStore,
    stats: StageStats,
}

impl<'a, S: Stage> StageDriver<'a, S> {
    pub fn new(cfg: &'a Config, stage: S) -> Self {
        let store = StageStore::new(Path::new(&cfg.paths.work_dir), stage.id());
        Self {
            cfg,
            stage,
            store,
            stats: StageStats::new(),
        }
    }

    pub fn stats(&self) -> &StageStats {
        &self.stats
    }

    /// Drive the stage over `dataset`, write the final CSV to `output`, and
    /// clean up the progress artifacts.
    ///
    /// Resumes from durable state unless `fresh` is set. A batch whose
    /// retries are exhausted is persisted as sentinel rows and the loop
    /// continues; only a partial-result write failure (or an unexpected
    /// crash) aborts, leaving progress intact for a later resume.
    pub async fn run(
        &mut self,
        dataset: &Dataset,
        output: &Path,
        fresh: bool,
    ) -> Result<StageOutcome> {
        let term_column = self.cfg.paths.search_term_column.as_str();
        let terms = dataset.terms(term_column);
        let schema = self.partial_schema(dataset, term_column);

        if fresh || !self.cfg.global.resume {
            self.store.cleanup();
        }

        let batch_size = self.cfg.batch.size.max(1);
        let total_batches = terms.len().div_ceil(batch_size);

        let progress = self.store.load_progress(&mut self.stats);
        // Partial rows are appended before the progress record advances, so
        // their count is the durable truth after a crash between the two,
        // including a crash before the very first progress write. Restarting
        // on top of an unreadable partial file would append duplicates, so
        // that aborts instead.
        let mut processed = self
            .store
            .read_results(&schema, &mut self.stats)
            .map_err(anyhow::Error::from)
            .with_context(|| {
                format!(
                    "reading persisted partial results for {}; rerun with --fresh to discard them",
                    self.stage.id()
                )
            })?
            .len()
            .min(terms.len());
        let start_batch = processed.div_ceil(batch_size);

        if let Some(record) = &progress {
            if record.current_batch != start_batch {
                warn!(
                    "progress record says batch {} but {} rows are persisted; resuming from batch {}",
                    record.current_batch, processed, start_batch
                );
            }
        }
        if processed > 0 {
            info!(
                stage = self.stage.id(),
                "resuming: {processed}/{} items already processed",
                terms.len()
            );
        } else {
            info!(
                stage = self.stage.id(),
                "starting fresh: {} items in {total_batches} batches",
                terms.len()
            );
        }

        let bar = ProgressBar::new(terms.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{bar:40} {pos}/{len} ({percent}%) eta {msg}")
        {
            bar.set_style(style);
        }
        bar.set_position(processed as u64);

        for batch_index in start_batch..total_batches {
            let lo = batch_index * batch_size;
            let hi = (lo + batch_size).min(terms.len());
            let batch_terms = &terms[lo..hi];

            info!(
                stage = self.stage.id(),
                "processing batch {}/{total_batches} (items {}-{hi})",
                batch_index + 1,
                lo + 1
            );

            let rows = match self
                .stage
                .process_batch(batch_terms, term_column, &mut self.stats)
                .await
            {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(
                        stage = self.stage.id(),
                        "batch {} failed after retries ({} items): {err}; writing sentinel records",
                        batch_index + 1,
                        batch_terms.len()
                    );
                    batch_terms
                        .iter()
                        .map(|t| self.stage.fallback_row(t, term_column))
                        .collect()
                }
            };

            let merged = self.merge_passthrough(rows, dataset, lo, term_column);
            self.store
                .save_results(&merged, &schema, &mut self.stats)
                .map_err(anyhow::Error::from)
                .with_context(|| format!("persisting batch {}", batch_index + 1))?;

            processed += batch_terms.len();
            self.store.save_progress(
                self.stage.id(),
                batch_index + 1,
                processed,
                terms.len(),
                &mut self.stats,
            );

            bar.set_position(processed as u64);
            bar.set_message(self.stats.eta(terms.len() - processed));
            info!(
                stage = self.stage.id(),
                "batch {}/{total_batches} done, speed {:.1} items/min, eta {}",
                batch_index + 1,
                self.stats.processing_speed(),
                self.stats.eta(terms.len() - processed)
            );

            if batch_index + 1 < total_batches {
                tokio::time::sleep(Duration::from_secs_f64(
                    self.cfg.batch.inter_batch_delay_seconds.max(0.0),
                ))
                .await;
            }
        }
        bar.finish_and_clear();

        // Completed: assemble the final dataset from the partial store. An
        // unreadable partial file aborts before cleanup so the rows survive.
        let all_rows = self
            .store
            .read_results(&schema, &mut self.stats)
            .map_err(anyhow::Error::from)
            .with_context(|| "reading back partial results for final assembly")?;
        let final_schema: Vec<String> = schema
            .iter()
            .filter(|f| !self.stage.drop_in_final().contains(&f.as_str()))
            .cloned()
            .collect();

        dataset::write_dataset(output, &final_schema, &all_rows)
            .with_context(|| format!("writing final output: {}", output.display()))?;
        info!(
            stage = self.stage.id(),
            "completed: {} rows written to {}",
            all_rows.len(),
            output.display()
        );

        self.store.cleanup();

        Ok(StageOutcome {
            schema: final_schema,
            rows: all_rows,
        })
    }

    /// Partial schema: term column, derived fields, then pass-through
    /// columns in input order.
    fn partial_schema(&self, dataset: &Dataset, term_column: &str) -> Vec<String> {
        let derived = self.stage.derived_fields();
        let mut schema: Vec<String> = Vec::with_capacity(dataset.headers.len() + derived.len());
        schema.push(term_column.to_string());
        schema.extend(derived.iter().map(|f| f.to_string()));
        for header in &dataset.headers {
            if header != term_column && !derived.contains(&header.as_str()) {
                schema.push(header.clone());
            }
        }
        schema
    }

    fn merge_passthrough(
        &self,
        rows: Vec<Row>,
        dataset: &Dataset,
        offset: usize,
        term_column: &str,
    ) -> Vec<Row> {
        rows.into_iter()
            .enumerate()
            .map(|(j, mut row)| {
                if let Some(source) = dataset.rows.get(offset + j) {
                    for header in &dataset.headers {
                        if header != term_column && !row.contains_key(header) {
                            row.insert(
                                header.clone(),
                                source.get(header).cloned().unwrap_or_default(),
                            );
                        }
                    }
                }
                row
            })
            .collect()
    }
}
