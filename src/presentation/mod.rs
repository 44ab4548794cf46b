// Presentation layer - HTTP control surface
pub mod app_state;
pub mod handlers;
