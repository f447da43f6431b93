use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub batch: Batch,
    #[serde(default)]
    pub retry: Retry,
    #[serde(default)]
    pub openai: OpenAi,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub print_summary: bool,
    /// Resume from a previous run when a progress record exists. `--fresh`
    /// on the CLI forces a restart per invocation.
    pub resume: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
            resume: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub input_csv: String,
    pub csv_folder: String,
    /// Where progress records and partial-result files live.
    pub work_dir: String,
    /// Name of the column holding the search term in every dataset.
    pub search_term_column: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_csv: "search_terms_sample.csv".into(),
            csv_folder: "csv_outputs".into(),
            work_dir: ".".into(),
            search_term_column: "Search Term".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub size: usize,
    pub inter_batch_delay_seconds: f64,
}
impl Default for Batch {
    fn default() -> Self {
        Self {
            size: 20,
            inter_batch_delay_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retry {
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
}
impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_seconds: 1.0,
            max_delay_seconds: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAi {
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub brand_max_tokens: u32,
    pub rating_max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_seconds: u64,
}
impl Default for OpenAi {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            brand_max_tokens: 200,
            rating_max_tokens: 300,
            temperature: 0.0,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    /// Keep rows whose fitted slope is at or below this value.
    pub slope_threshold: f64,
    /// Minimum non-zero samples needed before a slope is fitted at all.
    pub min_points: usize,
    pub drop_single_word: bool,
    pub write_stats_json: bool,
}
impl Default for Trend {
    fn default() -> Self {
        Self {
            slope_threshold: 0.0,
            min_points: 3,
            drop_single_word: true,
            write_stats_json: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub trend_filtered_filename: String,
    pub trend_stats_filename: String,
    pub brand_filtered_filename: String,
    pub no_brand_filename: String,
    pub assessed_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            trend_filtered_filename: "step0-trend-filtered.csv".into(),
            trend_stats_filename: "step0-trend-stats.json".into(),
            brand_filtered_filename: "step0-brand-filtered.csv".into(),
            no_brand_filename: "step0-no-brand-products.csv".into(),
            assessed_filename: "step1-products-assessed.csv".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}
