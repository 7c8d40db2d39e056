//! Core data models for the lead qualification bot

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Transport-level identifier of a remote user.
pub type UserId = i64;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Foot,
    Bike,
    Car,
}

impl DeliveryMode {
    pub const ALL: [DeliveryMode; 3] = [DeliveryMode::Foot, DeliveryMode::Bike, DeliveryMode::Car];

    pub fn code(self) -> &'static str {
        match self {
            DeliveryMode::Foot => "foot",
            DeliveryMode::Bike => "bike",
            DeliveryMode::Car => "car",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "foot" => Some(DeliveryMode::Foot),
            "bike" => Some(DeliveryMode::Bike),
            "car" => Some(DeliveryMode::Car),
            _ => None,
        }
    }
}

/// Coarse eligibility bucket derived from a citizenship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CitizenshipCategory {
    Domestic,
    Union,
    Foreign,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Citizenship {
    Russia,
    Belarus,
    Kazakhstan,
    Armenia,
    Kyrgyzstan,
    Other,
}

impl Citizenship {
    pub const ALL: [Citizenship; 6] = [
        Citizenship::Russia,
        Citizenship::Belarus,
        Citizenship::Kazakhstan,
        Citizenship::Armenia,
        Citizenship::Kyrgyzstan,
        Citizenship::Other,
    ];

    /// Short code used in transport payloads (`citizenship_<code>`).
    pub fn code(self) -> &'static str {
        match self {
            Citizenship::Russia => "ru",
            Citizenship::Belarus => "by",
            Citizenship::Kazakhstan => "kz",
            Citizenship::Armenia => "am",
            Citizenship::Kyrgyzstan => "kg",
            Citizenship::Other => "other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn category(self) -> CitizenshipCategory {
        match self {
            Citizenship::Russia => CitizenshipCategory::Domestic,
            Citizenship::Belarus
            | Citizenship::Kazakhstan
            | Citizenship::Armenia
            | Citizenship::Kyrgyzstan => CitizenshipCategory::Union,
            Citizenship::Other => CitizenshipCategory::Foreign,
        }
    }
}

/// Dialogue position of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Start,
    AwaitingAge,
    AwaitingUnderage,
    AwaitingCitizenship,
    AwaitingCity,
    AwaitingDelivery,
}

//
// ================= Reference Data =================
//

/// One row of the income table, keyed by (city, delivery mode).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomeRecord {
    pub city: String,
    #[serde(rename = "delivery")]
    pub delivery_mode: DeliveryMode,
    #[serde(rename = "eaes", deserialize_with = "flag")]
    pub eligible_union: bool,
    #[serde(rename = "not_rf", deserialize_with = "flag")]
    pub eligible_foreign: bool,
    #[serde(rename = "day", deserialize_with = "amount")]
    pub daily_income: u64,
    #[serde(rename = "month_avg", deserialize_with = "amount")]
    pub monthly_avg_income: u64,
    #[serde(rename = "month_max", deserialize_with = "amount")]
    pub monthly_max_income: u64,
}

impl IncomeRecord {
    pub fn admits(&self, category: CitizenshipCategory) -> bool {
        match category {
            CitizenshipCategory::Domestic => true,
            CitizenshipCategory::Union => self.eligible_union,
            CitizenshipCategory::Foreign => self.eligible_foreign,
        }
    }
}

/// Spreadsheet exports send booleans as "TRUE"/"FALSE".
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "TRUE" | "1" | "YES" => Ok(true),
            "FALSE" | "0" | "NO" | "" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean flag: {}", other))),
        },
        other => Err(de::Error::custom(format!("invalid boolean flag: {}", other))),
    }
}

/// Amounts arrive as numbers or numeric strings; fractions truncate.
fn amount<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let fractional = match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_u64() {
            Some(v) => return Ok(v),
            None => n.as_f64(),
        },
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',')
                .collect();
            if let Ok(v) = cleaned.parse::<u64>() {
                return Ok(v);
            }
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };

    match fractional {
        Some(v) if v.is_finite() && v >= 0.0 && v < u64::MAX as f64 => Ok(v.trunc() as u64),
        Some(v) => Err(de::Error::custom(format!("amount out of range: {}", v))),
        None => Err(de::Error::custom("amount must be numeric")),
    }
}

/// Display-ready income figures derived from an income record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomeFigures {
    pub daily_income: String,
    pub monthly_avg_income: String,
    pub monthly_max_income: String,
}

impl IncomeFigures {
    pub fn from_record(record: &IncomeRecord) -> Self {
        Self {
            daily_income: format_amount(record.daily_income),
            monthly_avg_income: format_amount(record.monthly_avg_income),
            monthly_max_income: format_amount(record.monthly_max_income),
        }
    }
}

/// Group digits in threes separated by a space: 125000 -> "125 000".
pub fn format_amount(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

//
// ================= Session =================
//

/// Answers accumulated during one pass through the dialogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionAttributes {
    pub citizenship: Option<Citizenship>,
    pub citizenship_category: Option<CitizenshipCategory>,
    /// Ordered once per citizenship choice; pagination only re-slices it.
    pub city_candidates: Option<Arc<Vec<String>>>,
    pub city: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub income: Option<IncomeFigures>,
    #[serde(default)]
    pub lead_submitted: bool,
}

impl SessionAttributes {
    /// Drop only what the delivery-mode step produced.
    pub fn clear_delivery(&mut self) {
        self.delivery_mode = None;
        self.income = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub username: Option<String>,
    pub state: DialogueState,
    pub attributes: SessionAttributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            username: None,
            state: DialogueState::Start,
            attributes: SessionAttributes::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Back to the initial state with empty attributes.
    pub fn reset(&mut self) {
        self.state = DialogueState::Start;
        self.attributes = SessionAttributes::default();
        self.updated_at = Utc::now();
    }
}

//
// ================= Inbound =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub username: Option<String>,
}

//
// ================= Lead =================
//

/// Answers of a qualified user, forwarded to the lead sink once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lead {
    pub lead_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub username: Option<String>,
    pub citizenship: Citizenship,
    pub city: String,
    pub delivery_mode: DeliveryMode,
    pub income: IncomeFigures,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryMode::Foot => "On foot",
            DeliveryMode::Bike => "Bike",
            DeliveryMode::Car => "Car",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Citizenship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Citizenship::Russia => "Russia",
            Citizenship::Belarus => "Belarus",
            Citizenship::Kazakhstan => "Kazakhstan",
            Citizenship::Armenia => "Armenia",
            Citizenship::Kyrgyzstan => "Kyrgyzstan",
            Citizenship::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DialogueState::Start => "start",
            DialogueState::AwaitingAge => "awaiting_age",
            DialogueState::AwaitingUnderage => "awaiting_underage",
            DialogueState::AwaitingCitizenship => "awaiting_citizenship",
            DialogueState::AwaitingCity => "awaiting_city",
            DialogueState::AwaitingDelivery => "awaiting_delivery",
        };
        write!(f, "{}", s)
    }
}
