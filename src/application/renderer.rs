// Renderer trait - The component that draws console items
use serde_json::Value;

/// Receives the item list of the live console whenever it changes.
pub trait ConsoleRenderer: Send + 'static {
    fn update_elements(&mut self, items: &[Value]);
}
