use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::dialogflow::build_contexts;
use crate::models::{
    Action, AppointmentRequest, BookingIntent, BusyInterval, FlowState, MissingField,
    SessionParams, WebhookRequest, WebhookResponse,
};
use crate::services::ai::Message;
use crate::services::availability::{self, BusinessHours, NoSlotAvailable};
use crate::services::validation;
use crate::state::AppState;

const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const NO_NOTE: &str = "No note";
const DATE_TIME_EXAMPLE: &str = "For example: \"Tomorrow at 1 pm\" or \"2030-06-17 at 10h\".";

/// Routes a fulfillment request to the handler for its action. Unknown
/// actions take the fallback path rather than a canned generic reply.
pub async fn handle_action(
    state: &Arc<AppState>,
    req: &WebhookRequest,
) -> Result<WebhookResponse, AppError> {
    let action = Action::parse(&req.query_result.action);
    let session = req.session.as_str();
    let params = SessionParams::from_contexts(&req.query_result.output_contexts);

    tracing::info!(action = %req.query_result.action, "dispatching intent");

    match action {
        Some(Action::Welcome) => Ok(welcome(&state.config.business_name)),
        Some(Action::StartScheduling) => Ok(start_scheduling(session)),
        Some(Action::Reschedule) => Ok(start_reschedule(session, params)),
        Some(Action::ProvidesName) => Ok(provides_name(req, session, params)),
        Some(Action::ProvidesEmail) => Ok(provides_email(req, session, params)),
        Some(Action::ProvidesDateTime) => provides_date_time(state, req, session, params).await,
        Some(Action::ConfirmsSlot) => Ok(confirms_slot(session, params)),
        Some(Action::DeniesSlot) => Ok(denies_slot(session, params)),
        Some(Action::WantsNote) => Ok(wants_note(session, params)),
        Some(Action::DeclinesNote) => Ok(declines_note(session, params)),
        Some(Action::ProvidesNote) => Ok(provides_note(req, session, params)),
        Some(Action::ConfirmsBooking) => confirms_booking(state, session, params).await,
        Some(Action::DeclinesBooking) => Ok(declines_booking()),
        Some(Action::Fallback) | None => fallback(state, req, session, params).await,
    }
}

fn welcome(business_name: &str) -> WebhookResponse {
    WebhookResponse::with_chips(
        vec![
            format!(
                "Hi there! Welcome to {business_name}. I can answer questions about the business \
                 or help you schedule an appointment."
            ),
            "What would you like to do?".to_string(),
        ],
        &["Schedule appointment", "Ask a question"],
        vec![],
    )
}

fn start_scheduling(session: &str) -> WebhookResponse {
    let params = SessionParams {
        intent: BookingIntent::Schedule.as_str().to_string(),
        ..SessionParams::default()
    };
    WebhookResponse::text(
        vec!["Great! Let's start with your name. What's your name?".to_string()],
        build_contexts(session, FlowState::CollectingName, &params),
    )
}

/// Rescheduling keeps whatever contact details the session already has and
/// collects a fresh date-time.
fn start_reschedule(session: &str, mut params: SessionParams) -> WebhookResponse {
    params.intent = BookingIntent::Reschedule.as_str().to_string();
    params.date_time.clear();
    params.suggested_time.clear();

    match params.first_missing() {
        Some(field @ (MissingField::Name | MissingField::Email)) => WebhookResponse::text(
            vec![format!(
                "Happy to move your appointment. First I need your {}. {}",
                field.label(),
                prompt_for(field)
            )],
            build_contexts(session, field.reprompt_state(), &params),
        ),
        _ => WebhookResponse::text(
            vec![format!(
                "Happy to move your appointment. What new date and time works for you? {DATE_TIME_EXAMPLE}"
            )],
            build_contexts(session, FlowState::CollectingDateTime, &params),
        ),
    }
}

fn provides_name(req: &WebhookRequest, session: &str, mut params: SessionParams) -> WebhookResponse {
    let name = req.param_or_query_text("person");
    if validation::validate_name(&name).is_err() {
        return WebhookResponse::text(
            vec![
                "Hmm, that doesn't look like a valid name. Please use letters only, without \
                 numbers or special characters."
                    .to_string(),
            ],
            build_contexts(session, FlowState::CollectingName, &params),
        );
    }
    params.name = name.clone();
    WebhookResponse::text(
        vec![format!("Thanks, {name}! What's your email address?")],
        build_contexts(session, FlowState::CollectingEmail, &params),
    )
}

fn provides_email(req: &WebhookRequest, session: &str, mut params: SessionParams) -> WebhookResponse {
    let email = req.param_or_query_text("email");
    if validation::validate_email(&email).is_err() {
        return WebhookResponse::text(
            vec!["Hmm, that doesn't look like a valid email address. Could you try again?".to_string()],
            build_contexts(session, FlowState::CollectingEmail, &params),
        );
    }
    params.email = email;
    WebhookResponse::text(
        vec![format!(
            "Got it. What date and time works for you? {DATE_TIME_EXAMPLE}"
        )],
        build_contexts(session, FlowState::CollectingDateTime, &params),
    )
}

async fn provides_date_time(
    state: &Arc<AppState>,
    req: &WebhookRequest,
    session: &str,
    mut params: SessionParams,
) -> Result<WebhookResponse, AppError> {
    let tz = state.config.business_timezone;
    let now = Utc::now().with_timezone(&tz);
    let raw = req.param_or_query_text("date-time");

    let requested = match validation::validate_datetime(&raw, now) {
        Ok(dt) => dt,
        Err(_) => {
            return Ok(WebhookResponse::text(
                vec![format!(
                    "I couldn't use that date and time. Please give me a future time. {DATE_TIME_EXAMPLE}"
                )],
                build_contexts(session, FlowState::CollectingDateTime, &params),
            ));
        }
    };

    let hours = BusinessHours {
        open: state.config.business_hours_start,
        close: state.config.business_hours_end,
    };
    let busy = day_busy_intervals(state, requested, hours, tz).await?;

    match availability::find_available_slot(requested, &busy, hours) {
        Ok(slot) if slot.start == requested => {
            params.date_time = slot.start.format(STORED_FORMAT).to_string();
            params.suggested_time.clear();
            Ok(WebhookResponse::with_chips(
                vec!["Great! The time you selected is available. Do you want to add a note to the appointment?".to_string()],
                &["Yes", "No"],
                build_contexts(session, FlowState::ChoosingNote, &params),
            ))
        }
        Ok(slot) => {
            params.suggested_time = slot.start.format(STORED_FORMAT).to_string();
            Ok(WebhookResponse::with_chips(
                vec![
                    format!(
                        "The time you requested ({}) is unavailable.",
                        format_human(requested)
                    ),
                    format!(
                        "The closest available slot is {}. Would you like to book it instead?",
                        format_human(slot.start)
                    ),
                ],
                &["Yes", "No"],
                build_contexts(session, FlowState::ConfirmingSlot, &params),
            ))
        }
        Err(NoSlotAvailable) => Ok(WebhookResponse::text(
            vec![
                "I'm sorry, there are no free slots left that day. Could you try another day?"
                    .to_string(),
            ],
            build_contexts(session, FlowState::CollectingDateTime, &params),
        )),
    }
}

/// Busy intervals covering the whole business day of the requested time,
/// converted into the business timezone and sorted.
async fn day_busy_intervals(
    state: &Arc<AppState>,
    requested: NaiveDateTime,
    hours: BusinessHours,
    tz: Tz,
) -> Result<Vec<BusyInterval>, AppError> {
    let date = requested.date();
    let Some((from, to)) = to_utc(tz, hours.open_at(date)).zip(to_utc(tz, hours.close_at(date)))
    else {
        return Ok(Vec::new());
    };

    let periods = state
        .calendar
        .busy_periods(from, to)
        .await
        .map_err(AppError::Calendar)?;

    let mut busy: Vec<BusyInterval> = periods
        .into_iter()
        .map(|p| BusyInterval::from_utc(p.start, p.end, tz))
        .collect();
    busy.sort_by_key(|b| b.start);
    Ok(busy)
}

fn confirms_slot(session: &str, mut params: SessionParams) -> WebhookResponse {
    if params.suggested_time.is_empty() {
        return missing_field_response(session, &params, MissingField::DateTime);
    }
    params.date_time = std::mem::take(&mut params.suggested_time);
    WebhookResponse::with_chips(
        vec!["Great. Do you want to add a note to the appointment?".to_string()],
        &["Yes", "No"],
        build_contexts(session, FlowState::ChoosingNote, &params),
    )
}

fn denies_slot(session: &str, mut params: SessionParams) -> WebhookResponse {
    params.suggested_time.clear();
    WebhookResponse::text(
        vec![format!(
            "Okay, no problem! What other date and time works for you? {DATE_TIME_EXAMPLE}"
        )],
        build_contexts(session, FlowState::CollectingDateTime, &params),
    )
}

fn wants_note(session: &str, params: SessionParams) -> WebhookResponse {
    WebhookResponse::text(
        vec!["Sure, what should the note say?".to_string()],
        build_contexts(session, FlowState::CollectingNote, &params),
    )
}

fn declines_note(session: &str, mut params: SessionParams) -> WebhookResponse {
    params.note = NO_NOTE.to_string();
    summary_response(session, params)
}

fn provides_note(req: &WebhookRequest, session: &str, mut params: SessionParams) -> WebhookResponse {
    let note = req.param_or_query_text("any");
    params.note = if note.is_empty() { NO_NOTE.to_string() } else { note };
    summary_response(session, params)
}

/// Recap of everything collected, asking for the final go-ahead. The
/// confirmation context differs for reschedules so the platform can route
/// the yes/no to the right intent.
fn summary_response(session: &str, params: SessionParams) -> WebhookResponse {
    if let Some(field) = params.first_missing() {
        return missing_field_response(session, &params, field);
    }

    let when = parse_stored(&params.date_time)
        .map(format_human)
        .unwrap_or_else(|| params.date_time.clone());
    let next = match BookingIntent::parse(&params.intent) {
        BookingIntent::Reschedule => FlowState::ConfirmingReschedule,
        BookingIntent::Schedule => FlowState::ConfirmingBooking,
    };

    WebhookResponse::with_chips(
        vec![
            "Great! Here's the information I have:".to_string(),
            format!(
                "- Name: {}\n- Email: {}\n- Date/Time: {}\n- Note: {}",
                params.name, params.email, when, params.note
            ),
            "Shall I book it?".to_string(),
        ],
        &["Yes", "No"],
        build_contexts(session, next, &params),
    )
}

async fn confirms_booking(
    state: &Arc<AppState>,
    session: &str,
    params: SessionParams,
) -> Result<WebhookResponse, AppError> {
    // re-check everything before touching the calendar; contexts are
    // client-supplied state
    if validation::validate_name(&params.name).is_err() {
        return Ok(missing_field_response(session, &params, MissingField::Name));
    }
    if validation::validate_email(&params.email).is_err() {
        return Ok(missing_field_response(session, &params, MissingField::Email));
    }
    let Some(start) = parse_stored(&params.date_time) else {
        return Ok(missing_field_response(session, &params, MissingField::DateTime));
    };

    let tz = state.config.business_timezone;
    let Some(start_utc) = to_utc(tz, start) else {
        return Ok(missing_field_response(session, &params, MissingField::DateTime));
    };

    let intent = BookingIntent::parse(&params.intent);
    let appointment = AppointmentRequest {
        name: params.name.clone(),
        email: params.email.clone(),
        start,
        intent,
        note: match params.note.as_str() {
            "" | NO_NOTE => None,
            note => Some(note.to_string()),
        },
    };

    state
        .calendar
        .create_event(
            &appointment.event_summary(),
            &appointment.event_description(),
            start_utc,
        )
        .await
        .map_err(AppError::Calendar)?;

    tracing::info!(start = %params.date_time, "appointment booked");

    let headline = match intent {
        BookingIntent::Schedule => "Awesome! Your appointment is all set:",
        BookingIntent::Reschedule => "All done! Your appointment has been moved:",
    };
    Ok(WebhookResponse::text(
        vec![
            headline.to_string(),
            format!(
                "- Name: {}\n- Email: {}\n- Date/Time: {}\n- Note: {}",
                params.name,
                params.email,
                format_human(start),
                params.note
            ),
            "Feel free to reach out if you need anything else. Goodbye for now!".to_string(),
        ],
        vec![],
    ))
}

fn declines_booking() -> WebhookResponse {
    WebhookResponse::text(
        vec![
            "Okay, I won't book anything. Just say \"schedule an appointment\" whenever you're ready."
                .to_string(),
        ],
        vec![],
    )
}

/// Unmatched input. Mid-flow the reply re-prompts for the field the active
/// step expects and refreshes its context; outside a flow the utterance is
/// treated as a free-form question for the language model, whose answer is
/// returned verbatim.
async fn fallback(
    state: &Arc<AppState>,
    req: &WebhookRequest,
    session: &str,
    params: SessionParams,
) -> Result<WebhookResponse, AppError> {
    let Some(step) = FlowState::from_contexts(&req.query_result.output_contexts) else {
        let question = req.query_result.query_text.trim();
        let answer = state
            .llm
            .chat(&faq_prompt(state), &[Message::user(question)])
            .await
            .map_err(AppError::Llm)?;
        return Ok(WebhookResponse::text(vec![answer], vec![]));
    };

    let message = match step {
        FlowState::CollectingName => "Sorry, I didn't get that. Can you tell me your name?",
        FlowState::CollectingEmail => "Sorry, I didn't get that. Can you give me your email address?",
        FlowState::CollectingDateTime => {
            "I didn't understand the date and time. Please try something like \"Tomorrow at 1 pm\"."
        }
        FlowState::ConfirmingSlot => {
            "Do you want to book the suggested time slot? Please answer yes or no."
        }
        FlowState::ChoosingNote => {
            "Would you like to add a note to the appointment? Please answer yes or no."
        }
        FlowState::CollectingNote => "Sorry, I didn't get that. What should the note say?",
        FlowState::ConfirmingBooking => "Shall I book the appointment? Please answer yes or no.",
        FlowState::ConfirmingReschedule => {
            "Shall I move your appointment to the new time? Please answer yes or no."
        }
    };

    Ok(WebhookResponse::text(
        vec![message.to_string()],
        build_contexts(session, step, &params),
    ))
}

fn faq_prompt(state: &Arc<AppState>) -> String {
    let cfg = &state.config;
    format!(
        "You are a friendly assistant for {}. Answer customer questions about the business \
         briefly and helpfully. Business hours are {}:00 to {}:00, timezone {}. If you don't \
         know the answer, suggest contacting the team directly.",
        cfg.business_name, cfg.business_hours_start, cfg.business_hours_end, cfg.business_timezone
    )
}

fn prompt_for(field: MissingField) -> String {
    match field {
        MissingField::Name => "What's your name?".to_string(),
        MissingField::Email => "What's your email address?".to_string(),
        MissingField::DateTime => {
            format!("What date and time works for you? {DATE_TIME_EXAMPLE}")
        }
    }
}

fn missing_field_response(
    session: &str,
    params: &SessionParams,
    field: MissingField,
) -> WebhookResponse {
    WebhookResponse::text(
        vec![format!(
            "I still need your {} before I can book. {}",
            field.label(),
            prompt_for(field)
        )],
        build_contexts(session, field.reprompt_state(), params),
    )
}

fn parse_stored(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, STORED_FORMAT).ok()
}

fn format_human(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d at %I:%M %p").to_string()
}

fn to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    local
        .and_local_timezone(tz)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
