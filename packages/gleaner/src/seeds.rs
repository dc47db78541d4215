//! Seed source: reads search inputs from a tabular file.
//!
//! One seed per row. The column layout decides the seed kind:
//! a `query` column, a `postal_code` + `country` pair, or a
//! `document_id` column. Header matching is tolerant of case and
//! spacing since seed files come from whoever commissioned the scrape.

use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::types::SeedRecord;

/// Columns resolved from the seed file header.
#[derive(Debug, Clone, Copy)]
enum SeedColumns {
    Query(usize),
    Postal { code: usize, country: usize },
    DocumentId(usize),
}

fn normalize_header(h: &str) -> String {
    h.trim().to_lowercase().replace([' ', '-'], "_")
}

fn resolve_columns(headers: &csv::StringRecord) -> Option<SeedColumns> {
    let mut query = None;
    let mut code = None;
    let mut country = None;
    let mut document_id = None;

    for (idx, raw) in headers.iter().enumerate() {
        match normalize_header(raw).as_str() {
            "query" | "term" | "search" => query = Some(idx),
            "postal_code" | "zip" | "zip_code" => code = Some(idx),
            "country" => country = Some(idx),
            "document_id" | "doc_id" => document_id = Some(idx),
            _ => {}
        }
    }

    if let (Some(code), Some(country)) = (code, country) {
        return Some(SeedColumns::Postal { code, country });
    }
    if let Some(idx) = document_id {
        return Some(SeedColumns::DocumentId(idx));
    }
    query.map(SeedColumns::Query)
}

/// Load seeds from a CSV file, applying an optional cap.
///
/// Blank rows are skipped; postal codes are uppercased and trimmed the
/// way locator sites expect them.
pub fn load_seeds(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Vec<SeedRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PipelineError::SeedFile(Box::new(e)))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::SeedFile(Box::new(e)))?
        .clone();

    let columns = resolve_columns(&headers).ok_or_else(|| {
        PipelineError::SeedFile(
            format!(
                "seed file {:?} must contain a 'query', 'document_id', or 'postal_code'+'country' column",
                path
            )
            .into(),
        )
    })?;

    let mut seeds = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping unparsable seed row");
                continue;
            }
        };

        let seed = match columns {
            SeedColumns::Query(idx) => row
                .get(idx)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(|q| SeedRecord::Query(q.to_string())),
            SeedColumns::Postal { code, country } => {
                let code = row.get(code).map(|c| c.trim().to_uppercase());
                let country = row.get(country).map(|c| c.trim().to_uppercase());
                match (code, country) {
                    (Some(code), Some(country)) if !code.is_empty() => {
                        Some(SeedRecord::PostalCode { code, country })
                    }
                    _ => None,
                }
            }
            SeedColumns::DocumentId(idx) => row
                .get(idx)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(|id| SeedRecord::DocumentId(id.to_string())),
        };

        if let Some(seed) = seed {
            seeds.push(seed);
        }

        if let Some(cap) = limit {
            if seeds.len() >= cap {
                break;
            }
        }
    }

    info!(path = ?path, count = seeds.len(), "Loaded seeds");
    Ok(seeds)
}

/// Build the single-seed list for the search-URL configuration variant.
pub fn search_url_seed(url: impl Into<String>) -> Vec<SeedRecord> {
    vec![SeedRecord::Query(url.into())]
}
