use crate::config::AppConfig;
use crate::services::ai::LlmProvider;
use crate::services::calendar::CalendarProvider;

pub struct AppState {
    pub config: AppConfig,
    pub calendar: Box<dyn CalendarProvider>,
    pub llm: Box<dyn LlmProvider>,
}
