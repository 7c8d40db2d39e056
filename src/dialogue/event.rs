//! Typed inbound events parsed from transport payloads

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfoTopic {
    Conditions,
    Requirements,
}

/// Follow-up pages reachable from the income summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Extra {
    Bonuses,
    Faq,
}

/// Everything a user can send. Selections keep the raw value so the
/// engine can tell an unknown choice apart from a stale one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Event {
    StartCommand,
    ShowInfo(InfoTopic),
    BackToMenu,
    BeginIncomeCalc,
    AgeAnswer { adult: bool },
    BackToAge,
    CitizenshipSelected(String),
    CityPage(usize),
    CitySelected(String),
    NoCity,
    DeliverySelected(String),
    ShowExtras(Extra),
    Recalculate,
    SubmitLead,
    Unrecognized(String),
}

/// Payload-free discriminant of [`Event`], used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartCommand,
    ShowInfo,
    BackToMenu,
    BeginIncomeCalc,
    AgeAnswer,
    BackToAge,
    CitizenshipSelected,
    CityPage,
    CitySelected,
    NoCity,
    DeliverySelected,
    ShowExtras,
    Recalculate,
    SubmitLead,
    Unrecognized,
}

impl Event {
    /// Parse a button payload.
    pub fn from_callback(data: &str) -> Self {
        match data {
            "info_conditions" => return Event::ShowInfo(InfoTopic::Conditions),
            "info_requirements" => return Event::ShowInfo(InfoTopic::Requirements),
            "back_to_start" | "back_to_start_after_lead" => return Event::BackToMenu,
            "calc_income" => return Event::BeginIncomeCalc,
            "age_yes" => return Event::AgeAnswer { adult: true },
            "age_no" => return Event::AgeAnswer { adult: false },
            "back_to_age" => return Event::BackToAge,
            "no_city" => return Event::NoCity,
            "income_recalc" => return Event::Recalculate,
            "income_bonus" => return Event::ShowExtras(Extra::Bonuses),
            "income_faq" => return Event::ShowExtras(Extra::Faq),
            "send_lead" => return Event::SubmitLead,
            _ => {}
        }

        if let Some(page) = data.strip_prefix("cities_page_") {
            return match page.parse::<usize>() {
                Ok(page) => Event::CityPage(page),
                Err(_) => Event::Unrecognized(data.to_string()),
            };
        }
        if let Some(code) = data.strip_prefix("citizenship_") {
            return Event::CitizenshipSelected(code.to_string());
        }
        if let Some(city) = data.strip_prefix("city_") {
            return Event::CitySelected(city.to_string());
        }
        if let Some(mode) = data.strip_prefix("delivery_") {
            return Event::DeliverySelected(mode.to_string());
        }

        Event::Unrecognized(data.to_string())
    }

    /// Parse a typed text message. Only `/start` (with or without a
    /// deep-link argument) means anything.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let command = trimmed.split_whitespace().next().unwrap_or_default();
        let command = command.split('@').next().unwrap_or_default();

        if command == "/start" {
            Event::StartCommand
        } else {
            Event::Unrecognized(trimmed.to_string())
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::StartCommand => EventKind::StartCommand,
            Event::ShowInfo(_) => EventKind::ShowInfo,
            Event::BackToMenu => EventKind::BackToMenu,
            Event::BeginIncomeCalc => EventKind::BeginIncomeCalc,
            Event::AgeAnswer { .. } => EventKind::AgeAnswer,
            Event::BackToAge => EventKind::BackToAge,
            Event::CitizenshipSelected(_) => EventKind::CitizenshipSelected,
            Event::CityPage(_) => EventKind::CityPage,
            Event::CitySelected(_) => EventKind::CitySelected,
            Event::NoCity => EventKind::NoCity,
            Event::DeliverySelected(_) => EventKind::DeliverySelected,
            Event::ShowExtras(_) => EventKind::ShowExtras,
            Event::Recalculate => EventKind::Recalculate,
            Event::SubmitLead => EventKind::SubmitLead,
            Event::Unrecognized(_) => EventKind::Unrecognized,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
