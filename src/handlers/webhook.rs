use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::models::{WebhookRequest, WebhookResponse};
use crate::services::conversation;
use crate::state::AppState;

/// Fulfillment endpoint. Malformed requests are the platform's fault and
/// get a 400; a failing collaborator is not the user's fault, so those
/// turn into a polite in-conversation reply instead of an error status.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, AppError> {
    if !body.has_valid_session() {
        return Err(AppError::BadRequest("invalid 'session' format".to_string()));
    }
    if body.query_result.action.is_empty() {
        return Err(AppError::BadRequest(
            "missing 'action' in 'queryResult'".to_string(),
        ));
    }

    tracing::info!(session = %body.session, action = %body.query_result.action, "webhook request");

    match conversation::handle_action(&state, &body).await {
        Ok(response) => Ok(Json(response)),
        Err(err @ (AppError::Calendar(_) | AppError::Llm(_))) => {
            tracing::error!(error = ?err, "collaborator call failed");
            Ok(Json(WebhookResponse::text(
                vec![
                    "Sorry, I'm having trouble with that right now. Please try again in a moment."
                        .to_string(),
                ],
                vec![],
            )))
        }
        Err(err) => Err(err),
    }
}
