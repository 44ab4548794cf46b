// Application layer - Loading and session use cases
pub mod console_api;
pub mod loader;
pub mod renderer;
pub mod session;

#[cfg(test)]
pub mod testing;
