// API trait for visual console data access
use crate::domain::console::Payload;
use async_trait::async_trait;
use std::fmt;

/// The two resources that make up a visual console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Properties,
    Items,
}

impl Resource {
    /// Query flag selecting this resource on the REST endpoint
    pub fn query_flag(self) -> &'static str {
        match self {
            Resource::Properties => "getVisualConsole",
            Resource::Items => "getVisualConsoleItems",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Properties => f.write_str("properties"),
            Resource::Items => f.write_str("items"),
        }
    }
}

#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// Fetch one resource of a visual console
    async fn fetch(&self, resource: Resource, console_id: u64) -> anyhow::Result<Payload>;
}
