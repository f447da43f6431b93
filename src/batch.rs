//! Batch processor: one completion call per batch, parsed into typed
//! records, with classified failures retried and everything else absorbed
//! into sentinel records so a single bad batch never stalls the run.

use crate::{
    client::{CompletionClient, CompletionRequest},
    config::OpenAi,
    error::{AiError, ErrorKind},
    parse::{self, BrandRecord, ERROR_API, RatingRecord},
    retry::RetryPolicy,
    stats::StageStats,
};
use std::time::Instant;
use tracing::warn;

const BRAND_SYSTEM: &str = "You are a brand identification expert. Respond with ONLY keyword:brand pairs separated by commas, no other text.";

const RATING_SYSTEM: &str = "You are an e-commerce product analyst. Respond with ONLY assessment numbers separated by commas and semicolons, no other text.";

pub struct BatchProcessor<C: CompletionClient> {
    client: C,
    retry: RetryPolicy,
    openai: OpenAi,
}

impl<C: CompletionClient> BatchProcessor<C> {
    pub fn new(client: C, retry: RetryPolicy, openai: OpenAi) -> Self {
        Self {
            client,
            retry,
            openai,
        }
    }

    /// Label a batch of keywords as brand / not-brand.
    ///
    /// Transient endpoint failures are retried per the policy and propagate
    /// after exhaustion; unexpected failures are absorbed into a full batch
    /// of `ERROR_API` records.
    pub async fn process_brand_batch(
        &self,
        keywords: &[String],
        stats: &mut StageStats,
    ) -> Result<Vec<BrandRecord>, AiError> {
        let started = Instant::now();
        let req = CompletionRequest {
            model: self.openai.model.clone(),
            system: BRAND_SYSTEM.to_string(),
            prompt: brand_prompt(keywords),
            max_tokens: self.openai.brand_max_tokens,
            temperature: self.openai.temperature,
        };

        let raw = match self.retry.run(stats, || self.client.complete(&req)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::Unexpected => {
                warn!("brand batch failed unexpectedly, substituting sentinels: {err}");
                return Ok(keywords
                    .iter()
                    .map(|kw| BrandRecord {
                        search_term: kw.clone(),
                        brand: ERROR_API.to_string(),
                    })
                    .collect());
            }
            Err(err) => return Err(err),
        };

        let records = parse::parse_brand_pairs(&raw, keywords);
        stats.log_batch(keywords.len(), started.elapsed());
        Ok(records)
    }

    /// Rate a batch of search terms on the seven viability axes.
    ///
    /// Same containment as `process_brand_batch`, with
    /// `RatingRecord::DEFAULT` as the sentinel.
    pub async fn process_rating_batch(
        &self,
        terms: &[String],
        stats: &mut StageStats,
    ) -> Result<Vec<RatingRecord>, AiError> {
        let started = Instant::now();
        let req = CompletionRequest {
            model: self.openai.model.clone(),
            system: RATING_SYSTEM.to_string(),
            prompt: rating_prompt(terms),
            max_tokens: self.openai.rating_max_tokens,
            temperature: self.openai.temperature,
        };

        let raw = match self.retry.run(stats, || self.client.complete(&req)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::Unexpected => {
                warn!("rating batch failed unexpectedly, substituting defaults: {err}");
                return Ok(vec![RatingRecord::DEFAULT; terms.len()]);
            }
            Err(err) => return Err(err),
        };

        let records = parse::parse_rating_tuples(&raw, terms);
        stats.log_batch(terms.len(), started.elapsed());
        Ok(records)
    }
}

fn brand_prompt(keywords: &[String]) -> String {
    let keywords_text = keywords.join(", ");
    format!(
        "Are these keywords brands? Return: keyword1:brand1, keyword2:brand2, keyword3:brand3...\n\n\
         Keywords: {keywords_text}\n\n\
         Rules:\n\
         - If it's a brand name, return the brand name\n\
         - If it's not a brand, return \"no\"\n\
         - Separate each keyword:brand pair with commas\n\
         - Use exact keyword spelling\n\n\
         Example response: makeup:no, nike:nike, toothbrush:no"
    )
}

fn rating_prompt(terms: &[String]) -> String {
    let terms_text = terms.join(", ");
    format!(
        "Assess these products for e-commerce potential. For each product, provide ratings:\n\n\
         Products: {terms_text}\n\n\
         Rate each product (0-5 scale) for:\n\
         1. SEASONAL DEMAND: 0=flat year, 5=strongly seasonal\n\
         2. SPECIFICITY (0=broad term like \"shampoo\", 5=very narrow like \"creatine monohydrate 5g gummies\").\n\
         3. COMMODITY: 0=brand-owned, 5=commodity\n\
         4. SUBSCRIBE & SAVE: 0=not suitable, 5=perfect for subscription\n\n\
         Plus binary (0/1) for:\n\
         5. GATED (1 if restricted Amazon category (OTC, medical device, adult, pesticides, hazmat, etc. \u{2014} not supplements), else 0)\n\
         6. ELECTRONICS/BATTERIES (1 if electronic, battery-powered, or requires replacement heads/charging)\n\
         7. INSURANCE/GOV (1 if reimbursed by insurance or supplied free by gov programs)\n\n\
         IMPORTANT: You MUST respond with EXACTLY 7 numbers per product, separated by commas.\n\
         Format: product1:1,2,3,4,0,0,0;product2:2,3,2,1,0,1,0\n\n\
         Example: makeup:2,2,3,2,0,0,0;nike_shoes:1,4,1,2,0,0,0"
    )
}
