// Renderer that reports console items through tracing
use crate::application::renderer::ConsoleRenderer;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct LogRenderer {
    renders: usize,
}

impl LogRenderer {
    /// Count items per `type` field; items without one are grouped as "unknown".
    fn tally(items: &[Value]) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in items {
            let kind = match item.get("type") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => "unknown".to_string(),
            };
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }
}

impl ConsoleRenderer for LogRenderer {
    fn update_elements(&mut self, items: &[Value]) {
        self.renders += 1;
        tracing::info!(
            target: "visual_console",
            "Rendering {} items (render #{})",
            items.len(),
            self.renders
        );
        tracing::debug!(target: "visual_console", "Item types: {:?}", Self::tally(items));
    }
}
