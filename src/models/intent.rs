/// Intent actions recognized from the platform's `queryResult.action` field.
/// The action names are part of the agent configuration on the platform side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Welcome,
    StartScheduling,
    ProvidesName,
    ProvidesEmail,
    ProvidesDateTime,
    ConfirmsSlot,
    DeniesSlot,
    WantsNote,
    DeclinesNote,
    ProvidesNote,
    ConfirmsBooking,
    DeclinesBooking,
    Reschedule,
    Fallback,
}

impl Action {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "defaultWelcomeIntent" => Some(Action::Welcome),
            "userWantsToScheduleAppointment" => Some(Action::StartScheduling),
            "userProvidesName" => Some(Action::ProvidesName),
            "userProvidesEmail" => Some(Action::ProvidesEmail),
            "userProvidesDateTime" => Some(Action::ProvidesDateTime),
            "userConfirmsSlot" => Some(Action::ConfirmsSlot),
            "userDeniesSlot" => Some(Action::DeniesSlot),
            "userConfirmsNote" => Some(Action::WantsNote),
            "userDeniesNote" => Some(Action::DeclinesNote),
            "userProvidesNote" => Some(Action::ProvidesNote),
            "userConfirmsBooking" => Some(Action::ConfirmsBooking),
            "userDeclinesBooking" => Some(Action::DeclinesBooking),
            "userWantsToReschedule" => Some(Action::Reschedule),
            "defaultFallbackIntent" => Some(Action::Fallback),
            _ => None,
        }
    }
}
