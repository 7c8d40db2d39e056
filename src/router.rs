//! Event router
//!
//! One call per inbound event: lease the user's session, run the dialogue
//! engine, execute its side effects, then commit. The lease is held for
//! the whole sequence, so events from the same user are applied in order
//! and a lead is written at most once.

use crate::dialogue::{DialogueEngine, Effect, Event, Outcome, Rejection, Screen};
use crate::leads::LeadSink;
use crate::models::UserRef;
use crate::session::SessionStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundEvent {
    pub user: UserRef,
    pub event: Event,
}

/// Result of routing one event: what happened and what to show.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Routed {
    pub outcome: Outcome,
    pub screens: Vec<Screen>,
}

pub struct EventRouter {
    store: Arc<dyn SessionStore>,
    engine: DialogueEngine,
    sink: Arc<dyn LeadSink>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn SessionStore>, engine: DialogueEngine, sink: Arc<dyn LeadSink>) -> Self {
        Self { store, engine, sink }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn engine(&self) -> &DialogueEngine {
        &self.engine
    }

    pub async fn route(&self, inbound: InboundEvent) -> Result<Routed> {
        let InboundEvent { user, event } = inbound;
        let mut lease = self.store.acquire(user.id).await?;
        let state = lease.state;

        let transition = self.engine.step(&lease, &user, &event)?;

        for effect in &transition.effects {
            match effect {
                Effect::SubmitLead(lead) => {
                    if let Err(e) = self.sink.append_lead(lead).await {
                        error!(
                            user_id = user.id,
                            lead_id = %lead.lead_id,
                            sink = self.sink.name(),
                            "Lead delivery failed: {}",
                            e
                        );
                        return Ok(Routed {
                            outcome: Outcome::Rejected(Rejection::LeadDeliveryFailed),
                            screens: vec![Screen::LeadRetry],
                        });
                    }
                    info!(
                        user_id = user.id,
                        lead_id = %lead.lead_id,
                        sink = self.sink.name(),
                        "Lead delivered"
                    );
                }
            }
        }

        if let Some(mut next) = transition.session {
            if user.username.is_some() {
                next.username = user.username.clone();
            }
            lease.commit(next);
        }

        match &transition.outcome {
            Outcome::Applied => info!(
                user_id = user.id,
                state = %state,
                event = %event.kind(),
                outcome = "applied",
                next_state = %lease.state,
                "Event routed"
            ),
            Outcome::Stale => info!(
                user_id = user.id,
                state = %state,
                event = %event.kind(),
                outcome = "stale",
                "Ignoring event for a screen the user has left"
            ),
            Outcome::Rejected(reason) => warn!(
                user_id = user.id,
                state = %state,
                event = %event.kind(),
                outcome = "rejected",
                ?reason,
                "Event rejected"
            ),
        }

        Ok(Routed {
            outcome: transition.outcome,
            screens: transition.screens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::{sample_records, FakeSource};
    use crate::cache::IncomeCache;
    use crate::dialogue::catalog::default_priority_cities;
    use crate::leads::tests::RecordingSink;
    use crate::models::{DeliveryMode, DialogueState};
    use crate::session::InMemorySessionStore;
    use std::time::Duration;

    struct Harness {
        router: Arc<EventRouter>,
        sink: Arc<RecordingSink>,
    }

    async fn harness(sink: RecordingSink) -> Harness {
        let source = Arc::new(FakeSource::with_records(sample_records()));
        let cache = Arc::new(IncomeCache::new(source, Duration::from_secs(900)));
        cache.refresh().await.unwrap();

        let sink = Arc::new(sink);
        let router = EventRouter::new(
            Arc::new(InMemorySessionStore::new()),
            DialogueEngine::new(cache, default_priority_cities()),
            sink.clone(),
        );

        Harness {
            router: Arc::new(router),
            sink,
        }
    }

    fn inbound(user_id: i64, event: Event) -> InboundEvent {
        InboundEvent {
            user: UserRef {
                id: user_id,
                username: Some(format!("user{}", user_id)),
            },
            event,
        }
    }

    async fn send(router: &EventRouter, user_id: i64, callback: &str) -> Routed {
        router
            .route(inbound(user_id, Event::from_callback(callback)))
            .await
            .unwrap()
    }

    async fn reach_summary(router: &EventRouter, user_id: i64) {
        for cb in ["calc_income", "age_yes", "citizenship_ru", "city_Москва", "delivery_bike"] {
            let routed = send(router, user_id, cb).await;
            assert_eq!(routed.outcome, Outcome::Applied, "step {}", cb);
        }
    }

    #[tokio::test]
    async fn test_full_conversation_submits_one_lead() {
        let h = harness(RecordingSink::new()).await;
        reach_summary(&h.router, 1).await;

        let routed = send(&h.router, 1, "send_lead").await;
        assert_eq!(routed.outcome, Outcome::Applied);
        assert_eq!(routed.screens, vec![Screen::LeadAccepted]);

        let leads = h.sink.inner.leads().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].city, "Москва");
        assert_eq!(leads[0].delivery_mode, DeliveryMode::Bike);
        assert_eq!(leads[0].username.as_deref(), Some("user1"));

        let session = h.router.store().get(1).await.unwrap();
        assert_eq!(session.state, DialogueState::Start);
        assert!(session.attributes.lead_submitted);
        assert_eq!(session.username.as_deref(), Some("user1"));
    }

    #[tokio::test]
    async fn test_back_to_back_submits_write_once() {
        let h = harness(RecordingSink::new()).await;
        reach_summary(&h.router, 2).await;

        let first = send(&h.router, 2, "send_lead").await;
        let second = send(&h.router, 2, "send_lead").await;

        assert_eq!(first.outcome, Outcome::Applied);
        assert_eq!(second.outcome, Outcome::Stale);
        assert_eq!(h.sink.attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_write_at_most_once() {
        let h = harness(RecordingSink::new().slow(Duration::from_millis(20))).await;
        reach_summary(&h.router, 3).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let router = h.router.clone();
            handles.push(tokio::spawn(async move {
                router.route(inbound(3, Event::SubmitLead)).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().outcome == Outcome::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(h.sink.attempts(), 1);
        assert_eq!(h.sink.inner.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_commits_nothing_and_retry_works() {
        let h = harness(RecordingSink::new()).await;
        reach_summary(&h.router, 4).await;
        let before = h.router.store().get(4).await.unwrap();

        h.sink.set_failing(true);
        let routed = send(&h.router, 4, "send_lead").await;
        assert_eq!(routed.outcome, Outcome::Rejected(Rejection::LeadDeliveryFailed));
        assert_eq!(routed.screens, vec![Screen::LeadRetry]);

        let after = h.router.store().get(4).await.unwrap();
        assert_eq!(after, before);
        assert!(!after.attributes.lead_submitted);

        h.sink.set_failing(false);
        let routed = send(&h.router, 4, "send_lead").await;
        assert_eq!(routed.outcome, Outcome::Applied);
        assert_eq!(h.sink.attempts(), 2);
        assert_eq!(h.sink.inner.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_http_sink_renders_retry() {
        use crate::api::tests::serve_stub;
        use crate::leads::HttpLeadSink;
        use axum::{http::StatusCode, routing::post, Router};

        let app = Router::new().route("/leads", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve_stub(app).await;
        let sink = HttpLeadSink::new(
            format!("{}/leads", base),
            chrono::FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap();

        let source = Arc::new(FakeSource::with_records(sample_records()));
        let cache = Arc::new(IncomeCache::new(source, Duration::from_secs(900)));
        cache.refresh().await.unwrap();
        let router = EventRouter::new(
            Arc::new(InMemorySessionStore::new()),
            DialogueEngine::new(cache, default_priority_cities()),
            Arc::new(sink),
        );

        reach_summary(&router, 8).await;
        let routed = send(&router, 8, "send_lead").await;

        assert_eq!(routed.outcome, Outcome::Rejected(Rejection::LeadDeliveryFailed));
        assert_eq!(routed.screens, vec![Screen::LeadRetry]);
        let session = router.store().get(8).await.unwrap();
        assert_eq!(session.state, DialogueState::AwaitingDelivery);
        assert!(!session.attributes.lead_submitted);
    }

    #[tokio::test]
    async fn test_replayed_events_do_not_mutate() {
        let h = harness(RecordingSink::new()).await;
        send(&h.router, 5, "calc_income").await;
        send(&h.router, 5, "age_yes").await;
        let before = h.router.store().get(5).await.unwrap();

        for cb in ["calc_income", "age_yes", "age_no", "city_Москва", "send_lead"] {
            let routed = send(&h.router, 5, cb).await;
            assert_eq!(routed.outcome, Outcome::Stale, "replay {}", cb);
            assert!(routed.screens.is_empty());
        }

        let routed = h
            .router
            .route(inbound(5, Event::from_text("hello")))
            .await
            .unwrap();
        assert_eq!(routed.outcome, Outcome::Rejected(Rejection::UnrecognizedPayload));

        assert_eq!(h.router.store().get(5).await.unwrap(), before);
        assert_eq!(h.sink.attempts(), 0);
    }

    #[tokio::test]
    async fn test_missing_record_then_restart() {
        let h = harness(RecordingSink::new()).await;
        for cb in ["calc_income", "age_yes", "citizenship_ru", "city_Тверь"] {
            send(&h.router, 6, cb).await;
        }

        let routed = send(&h.router, 6, "delivery_car").await;
        assert_eq!(routed.outcome, Outcome::Applied);
        assert!(matches!(
            routed.screens.as_slice(),
            [Screen::DeliveryUnavailable { .. }]
        ));
        let session = h.router.store().get(6).await.unwrap();
        assert_eq!(session.state, DialogueState::Start);
        assert!(session.attributes.city.is_none());

        let routed = h
            .router
            .route(inbound(6, Event::StartCommand))
            .await
            .unwrap();
        assert_eq!(routed.screens, vec![Screen::Welcome]);
        reach_summary(&h.router, 6).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_users_progress_independently() {
        let h = harness(RecordingSink::new()).await;

        let mut handles = Vec::new();
        for user_id in 100..120 {
            let router = h.router.clone();
            handles.push(tokio::spawn(async move {
                reach_summary(&router, user_id).await;
                send(&router, user_id, "send_lead").await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().outcome, Outcome::Applied);
        }

        assert_eq!(h.sink.inner.leads().await.len(), 20);
        assert_eq!(h.router.store().len().await, 20);
    }
}
