// Application state for HTTP handlers
use crate::application::session::ConsoleSession;

#[derive(Clone)]
pub struct AppState {
    pub session: ConsoleSession,
}
