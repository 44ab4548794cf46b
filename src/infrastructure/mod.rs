// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod log_renderer;
pub mod pandora_api;
