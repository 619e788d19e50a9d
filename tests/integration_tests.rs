use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use frontdesk::config::AppConfig;
use frontdesk::handlers;
use frontdesk::models::SLOT_MINUTES;
use frontdesk::services::ai::{LlmProvider, Message};
use frontdesk::services::calendar::{BusyPeriod, CalendarProvider};
use frontdesk::state::AppState;

const SESSION: &str = "projects/test/agent/sessions/abc";
const FAQ_ANSWER: &str = "We are open weekdays from 9 to 5.";

#[derive(Clone, Default)]
struct MockCalendar {
    busy: Arc<Mutex<Vec<BusyPeriod>>>,
    fail: bool,
}

impl MockCalendar {
    fn with_busy(ranges: Vec<BusyPeriod>) -> Self {
        Self { busy: Arc::new(Mutex::new(ranges)), fail: false }
    }

    fn failing() -> Self {
        Self { busy: Arc::default(), fail: true }
    }

    fn events(&self) -> Vec<BusyPeriod> {
        self.busy.lock().unwrap().clone()
    }
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn busy_periods(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusyPeriod>> {
        if self.fail {
            anyhow::bail!("calendar unreachable");
        }
        Ok(self.busy.lock().unwrap().clone())
    }

    async fn create_event(
        &self,
        _summary: &str,
        _description: &str,
        start: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("calendar unreachable");
        }
        self.busy.lock().unwrap().push(BusyPeriod {
            start,
            end: start + Duration::minutes(SLOT_MINUTES),
        });
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockLlm {
    calls: Arc<AtomicUsize>,
}

impl MockLlm {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, _system_prompt: &str, _messages: &[Message]) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FAQ_ANSWER.to_string())
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        business_name: "Testville Salon".to_string(),
        calendar_id: "cal@example.com".to_string(),
        calendar_token: "test-token".to_string(),
        openai_api_key: "test-key".to_string(),
        openai_model: "test-model".to_string(),
        business_timezone: chrono_tz::UTC,
        business_hours_start: 9,
        business_hours_end: 17,
    }
}

fn app(calendar: MockCalendar, llm: MockLlm) -> Router {
    let state = Arc::new(AppState {
        config: test_config(),
        calendar: Box::new(calendar),
        llm: Box::new(llm),
    });
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/webhook", post(handlers::webhook::webhook))
        .with_state(state)
}

fn busy_utc(h1: u32, m1: u32, h2: u32, m2: u32) -> BusyPeriod {
    BusyPeriod {
        start: Utc.with_ymd_and_hms(2030, 6, 17, h1, m1, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2030, 6, 17, h2, m2, 0).unwrap(),
    }
}

fn request(action: &str, query_text: &str, contexts: Value) -> Value {
    json!({
        "session": SESSION,
        "queryResult": {
            "queryText": query_text,
            "action": action,
            "parameters": {},
            "outputContexts": contexts
        }
    })
}

fn step_ctx(name: &str) -> Value {
    json!({
        "name": format!("{SESSION}/contexts/{name}"),
        "lifespanCount": 1,
        "parameters": {}
    })
}

fn params_ctx(params: Value) -> Value {
    json!({
        "name": format!("{SESSION}/contexts/session-parameters"),
        "lifespanCount": 99,
        "parameters": params
    })
}

async fn post_webhook(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn all_text(resp: &Value) -> String {
    resp["fulfillmentMessages"]
        .as_array()
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m["text"]["text"][0].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn context_names(resp: &Value) -> Vec<String> {
    resp["outputContexts"]
        .as_array()
        .map(|cs| {
            cs.iter()
                .filter_map(|c| c["name"].as_str())
                .filter_map(|n| n.rsplit_once("/contexts/"))
                .map(|(_, tail)| tail.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn session_params(resp: &Value) -> Value {
    resp["outputContexts"]
        .as_array()
        .and_then(|cs| {
            cs.iter()
                .find(|c| {
                    c["name"]
                        .as_str()
                        .is_some_and(|n| n.ends_with("/contexts/session-parameters"))
                })
                .map(|c| c["parameters"].clone())
        })
        .unwrap_or(Value::Null)
}

fn chip_options(resp: &Value) -> Vec<String> {
    resp["fulfillmentMessages"]
        .as_array()
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m["payload"]["richContent"][0][0]["options"].as_array())
                .flatten()
                .filter_map(|o| o["text"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health_check() {
    let app = app(MockCalendar::default(), MockLlm::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_welcome_offers_choices() {
    let app = app(MockCalendar::default(), MockLlm::default());
    let (status, body) = post_webhook(app, request("defaultWelcomeIntent", "hi", json!([]))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("Testville Salon"));
    assert!(chip_options(&body).iter().any(|c| c == "Schedule appointment"));
}

#[tokio::test]
async fn test_full_scheduling_flow() {
    let calendar = MockCalendar::default();
    let llm = MockLlm::default();

    // kick off the flow
    let (status, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userWantsToScheduleAppointment", "book me in", json!([])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("name"));
    assert!(context_names(&body).contains(&"await-name".to_string()));

    // name
    let contexts = json!([step_ctx("await-name"), params_ctx(session_params(&body))]);
    let (_, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userProvidesName", "Alice", contexts),
    )
    .await;
    assert!(all_text(&body).contains("Alice"));
    assert!(all_text(&body).contains("email"));
    assert_eq!(session_params(&body)["name"], "Alice");

    // email
    let contexts = json!([step_ctx("await-email"), params_ctx(session_params(&body))]);
    let (_, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userProvidesEmail", "alice@example.com", contexts),
    )
    .await;
    assert!(all_text(&body).contains("date and time"));

    // date-time, nothing on the calendar
    let contexts = json!([step_ctx("await-date-time"), params_ctx(session_params(&body))]);
    let (_, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userProvidesDateTime", "2030-06-17 14:00", contexts),
    )
    .await;
    assert!(all_text(&body).contains("available"));
    assert!(context_names(&body).contains(&"await-note-action".to_string()));
    assert_eq!(session_params(&body)["date_time"], "2030-06-17T14:00:00");

    // no note, straight to the summary
    let contexts = json!([step_ctx("await-note-action"), params_ctx(session_params(&body))]);
    let (_, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userDeniesNote", "no", contexts),
    )
    .await;
    let summary = all_text(&body);
    assert!(summary.contains("Alice"));
    assert!(summary.contains("alice@example.com"));
    assert!(summary.contains("Shall I book it?"));
    assert!(context_names(&body).contains(&"await-confirmation".to_string()));

    // confirm, the event lands on the calendar and the flow ends
    let contexts = json!([step_ctx("await-confirmation"), params_ctx(session_params(&body))]);
    let (status, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userConfirmsBooking", "yes", contexts),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("all set"));
    assert!(body.get("outputContexts").is_none());

    let events = calendar.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start, Utc.with_ymd_and_hms(2030, 6, 17, 14, 0, 0).unwrap());
    assert_eq!(llm.call_count(), 0);

    // the booked slot is now busy: asking for the same time gets the next one
    let contexts = json!([
        step_ctx("await-date-time"),
        params_ctx(json!({ "name": "Bob", "email": "bob@example.com" }))
    ]);
    let (_, body) = post_webhook(
        app(calendar.clone(), llm.clone()),
        request("userProvidesDateTime", "2030-06-17 14:00", contexts),
    )
    .await;
    assert!(all_text(&body).contains("unavailable"));
    assert_eq!(session_params(&body)["suggested_time"], "2030-06-17T14:30:00");
}

#[tokio::test]
async fn test_invalid_name_reprompts() {
    let contexts = json!([step_ctx("await-name"), params_ctx(json!({}))]);
    let (status, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userProvidesName", "R2-D2!", contexts),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("valid name"));
    assert!(context_names(&body).contains(&"await-name".to_string()));
}

#[tokio::test]
async fn test_invalid_email_reprompts() {
    let contexts = json!([
        step_ctx("await-email"),
        params_ctx(json!({ "name": "Alice" }))
    ]);
    let (status, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userProvidesEmail", "not-an-email", contexts),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("valid email"));
    assert!(context_names(&body).contains(&"await-email".to_string()));
}

#[tokio::test]
async fn test_past_datetime_reprompts() {
    let contexts = json!([
        step_ctx("await-date-time"),
        params_ctx(json!({ "name": "Alice", "email": "alice@example.com" }))
    ]);
    let (_, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userProvidesDateTime", "2001-01-01 10:00", contexts),
    )
    .await;
    assert!(all_text(&body).contains("future"));
    assert!(context_names(&body).contains(&"await-date-time".to_string()));
}

#[tokio::test]
async fn test_busy_slot_offers_next_one() {
    // [14:00, 14:30) is taken, so 14:30 is the counter-offer
    let calendar = MockCalendar::with_busy(vec![busy_utc(14, 0, 14, 30)]);
    let contexts = json!([
        step_ctx("await-date-time"),
        params_ctx(json!({ "name": "Alice", "email": "alice@example.com" }))
    ]);
    let (_, body) = post_webhook(
        app(calendar, MockLlm::default()),
        request("userProvidesDateTime", "2030-06-17 14:00", contexts),
    )
    .await;
    let text = all_text(&body);
    assert!(text.contains("unavailable"));
    assert!(text.contains("02:30 PM"));
    assert!(context_names(&body).contains(&"await-slot-confirmation".to_string()));
    assert_eq!(session_params(&body)["suggested_time"], "2030-06-17T14:30:00");
}

#[tokio::test]
async fn test_confirming_suggested_slot_promotes_it() {
    let contexts = json!([
        step_ctx("await-slot-confirmation"),
        params_ctx(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "suggested_time": "2030-06-17T14:30:00",
            "intent": "schedule"
        }))
    ]);
    let (_, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userConfirmsSlot", "yes", contexts),
    )
    .await;
    assert_eq!(session_params(&body)["date_time"], "2030-06-17T14:30:00");
    assert_eq!(session_params(&body)["suggested_time"], "");
    assert!(context_names(&body).contains(&"await-note-action".to_string()));
}

#[tokio::test]
async fn test_fully_booked_day_reprompts() {
    let calendar = MockCalendar::with_busy(vec![busy_utc(9, 0, 17, 0)]);
    let contexts = json!([
        step_ctx("await-date-time"),
        params_ctx(json!({ "name": "Alice", "email": "alice@example.com" }))
    ]);
    let (_, body) = post_webhook(
        app(calendar, MockLlm::default()),
        request("userProvidesDateTime", "2030-06-17 10:00", contexts),
    )
    .await;
    assert!(all_text(&body).contains("no free slots"));
    assert!(context_names(&body).contains(&"await-date-time".to_string()));
}

#[tokio::test]
async fn test_reschedule_keeps_contact_details() {
    let contexts = json!([params_ctx(json!({
        "name": "Alice",
        "email": "alice@example.com",
        "date_time": "2030-06-17T14:00:00",
        "intent": "schedule"
    }))]);
    let (_, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userWantsToReschedule", "move my appointment", contexts),
    )
    .await;
    assert!(all_text(&body).contains("date and time"));
    assert!(context_names(&body).contains(&"await-date-time".to_string()));
    let params = session_params(&body);
    assert_eq!(params["intent"], "reschedule");
    assert_eq!(params["name"], "Alice");
    assert_eq!(params["date_time"], "");
}

#[tokio::test]
async fn test_reschedule_summary_uses_its_own_confirmation() {
    let contexts = json!([
        step_ctx("await-note-action"),
        params_ctx(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "date_time": "2030-06-18T10:00:00",
            "intent": "reschedule"
        }))
    ]);
    let (_, body) = post_webhook(
        app(MockCalendar::default(), MockLlm::default()),
        request("userDeniesNote", "no", contexts),
    )
    .await;
    assert!(context_names(&body).contains(&"await-reschedule-confirmation".to_string()));
}

#[tokio::test]
async fn test_faq_answer_is_returned_verbatim() {
    let llm = MockLlm::default();
    let (status, body) = post_webhook(
        app(MockCalendar::default(), llm.clone()),
        request("defaultFallbackIntent", "What are your opening hours?", json!([])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all_text(&body), FAQ_ANSWER);
    assert_eq!(llm.call_count(), 1);
    assert!(body.get("outputContexts").is_none());
}

#[tokio::test]
async fn test_fallback_mid_flow_reprompts_without_llm() {
    let llm = MockLlm::default();
    let contexts = json!([step_ctx("await-name"), params_ctx(json!({}))]);
    let (_, body) = post_webhook(
        app(MockCalendar::default(), llm.clone()),
        request("defaultFallbackIntent", "ummm", contexts),
    )
    .await;
    assert!(all_text(&body).contains("name"));
    assert!(context_names(&body).contains(&"await-name".to_string()));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_action_falls_back() {
    let llm = MockLlm::default();
    let (status, body) = post_webhook(
        app(MockCalendar::default(), llm.clone()),
        request("somethingNew", "tell me a joke", json!([])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all_text(&body), FAQ_ANSWER);
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_booking_with_missing_name_asks_for_it() {
    let calendar = MockCalendar::default();
    let contexts = json!([
        step_ctx("await-confirmation"),
        params_ctx(json!({
            "email": "alice@example.com",
            "date_time": "2030-06-17T14:00:00",
            "intent": "schedule"
        }))
    ]);
    let (status, body) = post_webhook(
        app(calendar.clone(), MockLlm::default()),
        request("userConfirmsBooking", "yes", contexts),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("name"));
    assert!(context_names(&body).contains(&"await-name".to_string()));
    assert!(calendar.events().is_empty());
}

#[tokio::test]
async fn test_missing_action_is_rejected() {
    let body = json!({
        "session": SESSION,
        "queryResult": { "queryText": "hello" }
    });
    let (status, _) = post_webhook(app(MockCalendar::default(), MockLlm::default()), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_session_is_rejected() {
    let body = json!({
        "session": "not-a-session",
        "queryResult": { "queryText": "hi", "action": "defaultWelcomeIntent" }
    });
    let (status, _) = post_webhook(app(MockCalendar::default(), MockLlm::default()), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_calendar_outage_stays_friendly() {
    let contexts = json!([
        step_ctx("await-date-time"),
        params_ctx(json!({ "name": "Alice", "email": "alice@example.com" }))
    ]);
    let (status, body) = post_webhook(
        app(MockCalendar::failing(), MockLlm::default()),
        request("userProvidesDateTime", "2030-06-17 14:00", contexts),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(all_text(&body).contains("try again"));
}
