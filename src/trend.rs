//! Trend filter: drops search terms whose monthly volumes are growing, plus
//! single-word terms that are too unspecific to act on.

use crate::{config::Config, dataset};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct TrendEntry {
    pub search_term: String,
    pub slope: f64,
    pub trend: String,
}

#[derive(Debug, Default, Serialize)]
pub struct TrendStats {
    pub total_products: usize,
    pub declining_trends: usize,
    pub flat_trends: usize,
    pub growing_trends: usize,
    pub one_word_keywords: usize,
    pub kept_products: Vec<TrendEntry>,
    pub filtered_out_products: Vec<TrendEntry>,
}

/// Least-squares slope over the monthly values, ignoring zero and
/// non-numeric samples. Returns 0.0 when fewer than `min_points` samples
/// remain or the fit is degenerate.
pub fn trend_slope(monthly_values: &[&str], min_points: usize) -> f64 {
    let mut xs: Vec<f64> = Vec::with_capacity(monthly_values.len());
    let mut ys: Vec<f64> = Vec::with_capacity(monthly_values.len());
    for (i, value) in monthly_values.iter().enumerate() {
        if let Ok(n) = value.trim().parse::<i64>() {
            if n > 0 {
                xs.push(i as f64);
                ys.push(n as f64);
            }
        }
    }

    let n = xs.len();
    if n < min_points.max(2) {
        return 0.0;
    }

    let n_f = n as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(&ys).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

    let denom = n_f * sum_xx - sum_x * sum_x;
    if denom == 0.0 {
        return 0.0;
    }
    (n_f * sum_xy - sum_x * sum_y) / denom
}

/// Filter `input` to rows with slope at or below the threshold, writing the
/// kept rows to `output` with the input schema unchanged.
pub fn filter_by_declining_trends(
    cfg: &Config,
    input: &Path,
    output: &Path,
    slope_threshold: f64,
) -> Result<TrendStats> {
    let term_column = cfg.paths.search_term_column.as_str();
    let data = dataset::read_dataset(input, term_column)?;

    let monthly_columns: Vec<&String> = data
        .headers
        .iter()
        .filter(|h| h.as_str() != term_column && h.as_str() != "Brand")
        .collect();

    let mut stats = TrendStats::default();
    let mut kept_rows = Vec::new();

    for row in &data.rows {
        stats.total_products += 1;
        let term = row.get(term_column).cloned().unwrap_or_default();

        if cfg.trend.drop_single_word && !term.contains(' ') {
            stats.one_word_keywords += 1;
            stats.filtered_out_products.push(TrendEntry {
                search_term: term.clone(),
                slope: 0.0,
                trend: "one_word_keyword".to_string(),
            });
            debug!("one-word keyword filtered out: {term}");
            continue;
        }

        let values: Vec<&str> = monthly_columns
            .iter()
            .map(|col| row.get(col.as_str()).map(String::as_str).unwrap_or(""))
            .collect();
        let slope = trend_slope(&values, cfg.trend.min_points);

        if slope <= slope_threshold {
            let trend = if slope < 0.0 { "declining" } else { "flat" };
            if slope < 0.0 {
                stats.declining_trends += 1;
            } else {
                stats.flat_trends += 1;
            }
            stats.kept_products.push(TrendEntry {
                search_term: term.clone(),
                slope,
                trend: trend.to_string(),
            });
            debug!("{trend}: {term} (slope {slope:.3})");
            kept_rows.push(row.clone());
        } else {
            stats.growing_trends += 1;
            stats.filtered_out_products.push(TrendEntry {
                search_term: term.clone(),
                slope,
                trend: "growing".to_string(),
            });
            debug!("growing: {term} (slope {slope:.3}) filtered out");
        }
    }

    dataset::write_dataset(output, &data.headers, &kept_rows)?;
    info!(
        "trend filter kept {}/{} rows ({} declining, {} flat; {} growing and {} one-word filtered out)",
        kept_rows.len(),
        stats.total_products,
        stats.declining_trends,
        stats.flat_trends,
        stats.growing_trends,
        stats.one_word_keywords
    );

    Ok(stats)
}
