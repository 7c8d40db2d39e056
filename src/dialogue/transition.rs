//! Transition table of the screening dialogue
//!
//! Given a session and an event, compute the next session, the screens to
//! render and the side effects to run. Nothing here touches I/O except
//! reads of the in-memory income snapshot.

use super::catalog::{employment_terms, payout_schedule, required_documents};
use super::cities::{candidate_cities, paginate};
use super::event::{Event, EventKind};
use super::screen::{IncomeSummary, Screen};
use super::DialogueEngine;
use crate::models::{
    Citizenship, DeliveryMode, DialogueState, IncomeFigures, Lead, Session, UserRef,
};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// What happened to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    /// The event belongs to a screen the user has already left.
    Stale,
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    UnknownSelection,
    UnrecognizedPayload,
    LeadAlreadySubmitted,
    IncomeNotCalculated,
    SessionExpired,
    LeadDeliveryFailed,
}

/// Side effects that must run before the new session is committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SubmitLead(Lead),
}

#[derive(Debug)]
pub struct Transition {
    pub outcome: Outcome,
    /// Session to commit; `None` leaves the stored one untouched.
    pub session: Option<Session>,
    pub screens: Vec<Screen>,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn applied(session: Session) -> Self {
        Self {
            outcome: Outcome::Applied,
            session: Some(session),
            screens: vec![],
            effects: vec![],
        }
    }

    /// Accepted, but nothing in the session changes.
    pub fn render_only(screen: Screen) -> Self {
        Self {
            outcome: Outcome::Applied,
            session: None,
            screens: vec![screen],
            effects: vec![],
        }
    }

    pub fn stale() -> Self {
        Self {
            outcome: Outcome::Stale,
            session: None,
            screens: vec![],
            effects: vec![],
        }
    }

    pub fn rejected(reason: Rejection) -> Self {
        Self {
            outcome: Outcome::Rejected(reason),
            session: None,
            screens: vec![],
            effects: vec![],
        }
    }

    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screens.push(screen);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Routing table: does `state` have a handler for events of `kind`?
pub fn accepts(state: DialogueState, kind: EventKind) -> bool {
    use DialogueState as S;
    use EventKind as K;

    match kind {
        K::StartCommand | K::BackToMenu | K::ShowInfo => true,
        K::BeginIncomeCalc => state == S::Start,
        K::AgeAnswer => state == S::AwaitingAge,
        K::BackToAge => state == S::AwaitingUnderage,
        K::CitizenshipSelected => state == S::AwaitingCitizenship,
        K::CityPage | K::CitySelected | K::NoCity => state == S::AwaitingCity,
        K::DeliverySelected | K::ShowExtras | K::Recalculate | K::SubmitLead => {
            state == S::AwaitingDelivery
        }
        K::Unrecognized => false,
    }
}

fn reset(session: &Session) -> Session {
    let mut next = session.clone();
    next.reset();
    next
}

fn advance(session: &Session, state: DialogueState) -> Session {
    let mut next = session.clone();
    next.state = state;
    next.updated_at = Utc::now();
    next
}

impl DialogueEngine {
    /// Compute the transition for `event` against the current `session`.
    ///
    /// Errors only when reference data is needed and has never loaded.
    pub fn step(&self, session: &Session, user: &UserRef, event: &Event) -> Result<Transition> {
        if let Event::Unrecognized(_) = event {
            return Ok(Transition::rejected(Rejection::UnrecognizedPayload));
        }
        if !accepts(session.state, event.kind()) {
            return Ok(Transition::stale());
        }

        let transition = match event {
            Event::StartCommand | Event::BackToMenu => {
                Transition::applied(reset(session)).with_screen(Screen::Welcome)
            }
            Event::ShowInfo(topic) => {
                Transition::applied(reset(session)).with_screen(Screen::Info { topic: *topic })
            }
            Event::BeginIncomeCalc => {
                let mut next = reset(session);
                next.state = DialogueState::AwaitingAge;
                Transition::applied(next).with_screen(Screen::AgeQuestion)
            }
            Event::AgeAnswer { adult: true } => {
                Transition::applied(advance(session, DialogueState::AwaitingCitizenship))
                    .with_screen(Screen::citizenship_options())
            }
            Event::AgeAnswer { adult: false } => {
                Transition::applied(advance(session, DialogueState::AwaitingUnderage))
                    .with_screen(Screen::Underage)
            }
            Event::BackToAge => Transition::applied(advance(session, DialogueState::AwaitingAge))
                .with_screen(Screen::AgeQuestion),
            Event::CitizenshipSelected(code) => self.select_citizenship(session, code)?,
            Event::CityPage(page) => match &session.attributes.city_candidates {
                Some(candidates) => {
                    Transition::render_only(Screen::CityList(paginate(candidates, *page)))
                }
                None => Transition::rejected(Rejection::SessionExpired)
                    .with_screen(Screen::SessionExpired),
            },
            Event::CitySelected(city) => select_city(session, city),
            Event::NoCity => {
                Transition::applied(reset(session)).with_screen(Screen::CityUnavailable)
            }
            Event::DeliverySelected(code) => self.select_delivery(session, code)?,
            Event::ShowExtras(extra) => {
                Transition::render_only(Screen::Extras { extra: *extra })
            }
            Event::Recalculate => {
                // city and citizenship stay; only the delivery step is redone
                let mut next = advance(session, DialogueState::AwaitingDelivery);
                next.attributes.clear_delivery();
                Transition::applied(next).with_screen(Screen::delivery_options())
            }
            Event::SubmitLead => submit_lead(session, user),
            Event::Unrecognized(_) => Transition::rejected(Rejection::UnrecognizedPayload),
        };

        Ok(transition)
    }

    fn select_citizenship(&self, session: &Session, code: &str) -> Result<Transition> {
        let Some(citizenship) = Citizenship::from_code(code) else {
            return Ok(Transition::rejected(Rejection::UnknownSelection));
        };

        let category = citizenship.category();
        let snapshot = self.cache.current_snapshot()?;
        let candidates = candidate_cities(snapshot.records(), category, &self.priority_cities);
        let first_page = paginate(&candidates, 0);

        let mut next = advance(session, DialogueState::AwaitingCity);
        next.attributes.citizenship = Some(citizenship);
        next.attributes.citizenship_category = Some(category);
        next.attributes.city_candidates = Some(Arc::new(candidates));

        Ok(Transition::applied(next).with_screen(Screen::CityList(first_page)))
    }

    fn select_delivery(&self, session: &Session, code: &str) -> Result<Transition> {
        let Some(mode) = DeliveryMode::from_code(code) else {
            return Ok(Transition::rejected(Rejection::UnknownSelection));
        };
        let (Some(city), Some(citizenship)) =
            (&session.attributes.city, session.attributes.citizenship)
        else {
            return Ok(Transition::rejected(Rejection::SessionExpired)
                .with_screen(Screen::SessionExpired));
        };

        let snapshot = self.cache.current_snapshot()?;
        let Some(record) = snapshot.find(city, mode) else {
            return Ok(Transition::applied(reset(session)).with_screen(
                Screen::DeliveryUnavailable {
                    city: city.clone(),
                    delivery_mode: mode,
                },
            ));
        };

        let income = IncomeFigures::from_record(record);
        let summary = IncomeSummary {
            city: city.clone(),
            delivery_mode: mode,
            income: income.clone(),
            payout: payout_schedule(citizenship),
            employment: employment_terms(citizenship),
            documents: required_documents(citizenship),
        };

        let mut next = advance(session, DialogueState::AwaitingDelivery);
        next.attributes.delivery_mode = Some(mode);
        next.attributes.income = Some(income);

        Ok(Transition::applied(next).with_screen(Screen::IncomeSummary(summary)))
    }
}

fn select_city(session: &Session, city: &str) -> Transition {
    let known = session
        .attributes
        .city_candidates
        .as_ref()
        .map(|candidates| candidates.iter().any(|c| c == city));

    match known {
        None => Transition::rejected(Rejection::SessionExpired).with_screen(Screen::SessionExpired),
        Some(false) => Transition::rejected(Rejection::UnknownSelection),
        Some(true) => {
            let mut next = advance(session, DialogueState::AwaitingDelivery);
            next.attributes.city = Some(city.to_string());
            next.attributes.clear_delivery();
            Transition::applied(next).with_screen(Screen::delivery_options())
        }
    }
}

/// Guarded submission. The returned session already carries
/// `lead_submitted = true`; the router commits it only once the sink has
/// accepted the lead.
fn submit_lead(session: &Session, user: &UserRef) -> Transition {
    let attrs = &session.attributes;
    if attrs.lead_submitted {
        return Transition::rejected(Rejection::LeadAlreadySubmitted);
    }

    let (Some(citizenship), Some(city), Some(mode), Some(income)) = (
        attrs.citizenship,
        attrs.city.as_ref(),
        attrs.delivery_mode,
        attrs.income.as_ref(),
    ) else {
        return Transition::rejected(Rejection::IncomeNotCalculated)
            .with_screen(Screen::IncomeRequired);
    };

    let lead = Lead {
        lead_id: Uuid::new_v4(),
        created_at: Utc::now(),
        user_id: session.user_id,
        username: user.username.clone().or_else(|| session.username.clone()),
        citizenship,
        city: city.clone(),
        delivery_mode: mode,
        income: income.clone(),
    };

    // terminal: back to the menu, the flag survives until an explicit reset
    let mut next = reset(session);
    next.attributes.lead_submitted = true;

    Transition::applied(next)
        .with_effect(Effect::SubmitLead(lead))
        .with_screen(Screen::LeadAccepted)
}
