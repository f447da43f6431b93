//! termsift: an offline batch pipeline that enriches e-commerce search
//! terms with AI-derived labels.
//!
//! Stages run sequentially over CSV datasets: a trend filter drops growing
//! or single-word terms, a brand stage labels each term with its brand (or
//! "no"), and a validation stage rates unbranded products on seven
//! viability axes. Each AI stage checkpoints progress and partial results
//! to disk so an interrupted run resumes where it left off.

pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod retry;
pub mod stage;
pub mod stats;
pub mod store;
pub mod trend;
pub mod util;
