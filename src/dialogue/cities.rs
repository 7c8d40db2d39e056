//! City eligibility, ordering and pagination

use crate::dialogue::catalog::PAGE_SIZE;
use crate::models::{CitizenshipCategory, IncomeRecord};
use serde::Serialize;
use std::collections::BTreeSet;

/// Distinct cities admitted for `category`, priority cities first (in
/// priority order) followed by the rest in lexicographic order.
pub fn candidate_cities(
    records: &[IncomeRecord],
    category: CitizenshipCategory,
    priority: &[String],
) -> Vec<String> {
    let eligible: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.admits(category))
        .map(|r| r.city.as_str())
        .collect();

    let mut ordered: Vec<String> = Vec::with_capacity(eligible.len());
    for city in priority {
        if eligible.contains(city.as_str()) && !ordered.contains(city) {
            ordered.push(city.clone());
        }
    }

    // BTreeSet iterates in sorted order
    ordered.extend(
        eligible
            .into_iter()
            .filter(|c| !priority.iter().any(|p| p == c))
            .map(str::to_string),
    );

    ordered
}

/// One rendered page of the city list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CityPage {
    pub page: usize,
    pub cities: Vec<String>,
    pub has_previous: bool,
    pub has_next: bool,
    /// "My city is absent" is offered on every page.
    pub offer_no_city: bool,
}

pub fn paginate(candidates: &[String], page: usize) -> CityPage {
    let start = page.saturating_mul(PAGE_SIZE).min(candidates.len());
    let end = start.saturating_add(PAGE_SIZE).min(candidates.len());

    CityPage {
        page,
        cities: candidates[start..end].to_vec(),
        has_previous: page > 0,
        has_next: page
            .checked_add(1)
            .and_then(|next| next.checked_mul(PAGE_SIZE))
            .map(|bound| bound < candidates.len())
            .unwrap_or(false),
        offer_no_city: true,
    }
}
