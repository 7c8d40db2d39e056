//! Fixed reference tables consulted by the dialogue

use crate::models::Citizenship;
use serde::Serialize;

/// Cities shown on the city list.
pub const PAGE_SIZE: usize = 10;

/// Major cities listed first, in this order, when eligible.
pub const DEFAULT_PRIORITY_CITIES: [&str; 6] = [
    "Москва",
    "Санкт-Петербург",
    "Екатеринбург",
    "Новосибирск",
    "Казань",
    "Нижний Новгород",
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutSchedule {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentTerms {
    /// Self-employed, registered through a service partner.
    SelfEmployed,
    /// Civil contract with a service partner.
    PartnerContract,
}

fn has_daily_payouts(citizenship: Citizenship) -> bool {
    !matches!(citizenship, Citizenship::Other)
}

pub fn payout_schedule(citizenship: Citizenship) -> PayoutSchedule {
    if has_daily_payouts(citizenship) {
        PayoutSchedule::Daily
    } else {
        PayoutSchedule::Weekly
    }
}

pub fn employment_terms(citizenship: Citizenship) -> EmploymentTerms {
    if has_daily_payouts(citizenship) {
        EmploymentTerms::SelfEmployed
    } else {
        EmploymentTerms::PartnerContract
    }
}

const MIGRANT_UNION_DOCUMENTS: &[&str] = &[
    "passport",
    "migration card",
    "taxpayer id",
    "SNILS (if any)",
    "fingerprint registration (if any)",
];

/// Paperwork needed to sign up, by citizenship.
pub fn required_documents(citizenship: Citizenship) -> &'static [&'static str] {
    match citizenship {
        Citizenship::Russia => &["passport", "taxpayer id", "medical book (optional)"],
        Citizenship::Belarus => &[
            "passport",
            "taxpayer id",
            "SNILS (if any)",
            "fingerprint registration (if any)",
        ],
        Citizenship::Kazakhstan | Citizenship::Armenia | Citizenship::Kyrgyzstan => {
            MIGRANT_UNION_DOCUMENTS
        }
        Citizenship::Other => &[
            "passport",
            "migration card",
            "taxpayer id (if any)",
            "patent, temporary or permanent residence permit (by region)",
            "SNILS or fingerprint registration (if any)",
        ],
    }
}

pub fn default_priority_cities() -> Vec<String> {
    DEFAULT_PRIORITY_CITIES.iter().map(|c| c.to_string()).collect()
}
