//! Render instructions handed to the presentation layer
//!
//! A screen names what to show and carries the structured data for it.
//! Copy, markup and keyboards belong to whoever renders it.

use crate::dialogue::catalog::{EmploymentTerms, PayoutSchedule};
use crate::dialogue::cities::CityPage;
use crate::dialogue::event::{Extra, InfoTopic};
use crate::models::{Citizenship, DeliveryMode, IncomeFigures};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    /// Main menu: conditions, requirements, income estimate.
    Welcome,
    Info { topic: InfoTopic },
    AgeQuestion,
    /// Minors may still work in some cities with parental consent.
    Underage,
    CitizenshipOptions { options: Vec<Citizenship> },
    CityList(CityPage),
    DeliveryOptions { options: Vec<DeliveryMode> },
    IncomeSummary(IncomeSummary),
    /// Bonuses or FAQ, shown with the income follow-up menu.
    Extras { extra: Extra },
    CityUnavailable,
    DeliveryUnavailable { city: String, delivery_mode: DeliveryMode },
    /// The lead was recorded; offers the sign-up form and a way back.
    LeadAccepted,
    /// The lead could not be recorded; the user may press submit again.
    LeadRetry,
    /// Submit pressed before any income was calculated.
    IncomeRequired,
    /// The session no longer holds what this screen needs; restart.
    SessionExpired,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncomeSummary {
    pub city: String,
    pub delivery_mode: DeliveryMode,
    pub income: IncomeFigures,
    pub payout: PayoutSchedule,
    pub employment: EmploymentTerms,
    pub documents: &'static [&'static str],
}

impl Screen {
    pub fn citizenship_options() -> Self {
        Screen::CitizenshipOptions {
            options: Citizenship::ALL.to_vec(),
        }
    }

    pub fn delivery_options() -> Self {
        Screen::DeliveryOptions {
            options: DeliveryMode::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_serializes_with_tag() {
        let json = serde_json::to_value(Screen::delivery_options()).unwrap();
        assert_eq!(json["screen"], "delivery_options");
        assert_eq!(json["options"], serde_json::json!(["foot", "bike", "car"]));
    }

    #[test]
    fn test_city_list_flattens_page() {
        let page = crate::dialogue::cities::paginate(&["Тверь".to_string()], 0);
        let json = serde_json::to_value(Screen::CityList(page)).unwrap();
        assert_eq!(json["screen"], "city_list");
        assert_eq!(json["cities"], serde_json::json!(["Тверь"]));
        assert_eq!(json["offer_no_city"], true);
    }
}
