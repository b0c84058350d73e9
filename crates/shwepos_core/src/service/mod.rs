//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod cart;
pub mod checkout_service;
pub mod customer_service;
pub mod inventory_service;
pub mod pricing;
pub mod report_service;
pub mod return_service;
pub mod settings_service;
pub mod supplier_service;
pub mod user_service;

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Lowercased, whitespace-separated search terms.
pub(crate) fn search_terms(query: &str) -> Vec<String> {
    WHITESPACE_RE
        .split(query.trim())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True when every term occurs in at least one field (case-insensitive).
pub(crate) fn matches_all_terms(terms: &[String], fields: &[&str]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let fields: Vec<String> = fields.iter().map(|field| field.to_lowercase()).collect();
    terms
        .iter()
        .all(|term| fields.iter().any(|field| field.contains(term.as_str())))
}
