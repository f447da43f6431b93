//! Parsers for the delimited text the completion endpoint returns.
//!
//! Both parsers are pure functions of (raw response, original batch items)
//! and always produce exactly one record per input item. Malformed output
//! degrades to sentinels or defaults in place; it never shortens the result
//! and never panics.

/// Label recorded when a brand pair cannot be parsed out of the response.
pub const ERROR_PARSING: &str = "ERROR_PARSING";
/// Label recorded when the endpoint call itself failed for a whole batch.
pub const ERROR_API: &str = "ERROR_API";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandRecord {
    /// The input search term, original casing preserved.
    pub search_term: String,
    /// The brand label, or "no", or a sentinel.
    pub brand: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingRecord {
    pub seasonal: u8,
    pub specificity: u8,
    pub commodity: u8,
    pub subscribe_save: u8,
    pub gated: u8,
    pub electronics_batteries: u8,
    pub insurance_gov: u8,
}

impl RatingRecord {
    /// Substituted for any segment that fails validation, whatever the
    /// failure mode (wrong count, non-numeric, out of range, missing colon).
    pub const DEFAULT: RatingRecord = RatingRecord {
        seasonal: 3,
        specificity: 3,
        commodity: 3,
        subscribe_save: 2,
        gated: 0,
        electronics_batteries: 0,
        insurance_gov: 0,
    };
}

impl Default for RatingRecord {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Parse comma-separated `keyword:brand` pairs against the batch keywords.
///
/// Each parsed keyword is matched back to the original list
/// case-insensitively; when no match exists the pair is assigned
/// positionally. Pairs with no colon become `ERROR_PARSING` at their
/// position, short responses are padded with `ERROR_PARSING`, and pairs
/// beyond the input length are ignored so the result is always one record
/// per keyword.
pub fn parse_brand_pairs(raw: &str, keywords: &[String]) -> Vec<BrandRecord> {
    let mut records: Vec<BrandRecord> = Vec::with_capacity(keywords.len());

    for (i, pair) in raw.split(',').map(str::trim).enumerate() {
        if records.len() >= keywords.len() {
            break;
        }
        match pair.split_once(':') {
            Some((keyword_part, brand_part)) => {
                let keyword = keyword_part.trim();
                let brand = brand_part.trim().to_string();
                let matched = keywords
                    .iter()
                    .find(|orig| orig.eq_ignore_ascii_case(keyword));
                let search_term = match matched {
                    Some(orig) => orig.clone(),
                    // Positional fallback; can misassign if the response
                    // reorders items, kept as documented behavior.
                    None => keywords[i.min(keywords.len() - 1)].clone(),
                };
                records.push(BrandRecord { search_term, brand });
            }
            None => {
                let search_term = keywords[records.len()].clone();
                records.push(BrandRecord {
                    search_term,
                    brand: ERROR_PARSING.to_string(),
                });
            }
        }
    }

    while records.len() < keywords.len() {
        records.push(BrandRecord {
            search_term: keywords[records.len()].clone(),
            brand: ERROR_PARSING.to_string(),
        });
    }

    records
}

/// Parse semicolon-separated `product:n1,...,n7` rating segments.
///
/// A segment is valid only if it has a colon, exactly 7 numeric tokens, the
/// first four in 0..=5 and the last three in 0..=1. Invalid or missing
/// segments become `RatingRecord::DEFAULT` at their position; matching is
/// purely positional, the product label is not inspected.
pub fn parse_rating_tuples(raw: &str, terms: &[String]) -> Vec<RatingRecord> {
    let mut records: Vec<RatingRecord> = Vec::with_capacity(terms.len());

    for segment in raw.split(';') {
        if records.len() >= terms.len() {
            break;
        }
        records.push(parse_rating_segment(segment).unwrap_or(RatingRecord::DEFAULT));
    }

    while records.len() < terms.len() {
        records.push(RatingRecord::DEFAULT);
    }

    records
}

fn parse_rating_segment(segment: &str) -> Option<RatingRecord> {
    let (_, ratings_part) = segment.split_once(':')?;
    let tokens: Vec<&str> = ratings_part.split(',').map(str::trim).collect();
    if tokens.len() != 7 {
        return None;
    }

    let mut values = [0u8; 7];
    for (i, token) in tokens.iter().enumerate() {
        values[i] = token.parse().ok()?;
    }

    let scale_ok = values[..4].iter().all(|&v| v <= 5);
    let binary_ok = values[4..].iter().all(|&v| v <= 1);
    if !scale_ok || !binary_ok {
        return None;
    }

    Some(RatingRecord {
        seasonal: values[0],
        specificity: values[1],
        commodity: values[2],
        subscribe_save: values[3],
        gated: values[4],
        electronics_batteries: values[5],
        insurance_gov: values[6],
    })
}
