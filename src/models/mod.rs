pub mod appointment;
pub mod dialogflow;
pub mod intent;
pub mod session;

pub use appointment::{AppointmentRequest, BookingIntent, BusyInterval, Slot, SLOT_MINUTES};
pub use dialogflow::{Context, FulfillmentMessage, QueryResult, WebhookRequest, WebhookResponse};
pub use intent::Action;
pub use session::{FlowState, MissingField, SessionParams};
