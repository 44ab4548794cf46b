// Item link model - Cross-console navigation targets
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Link data attached to a clicked console item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLink {
    #[serde(default, deserialize_with = "lenient_id")]
    pub linked_layout_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub linked_layout_agent_id: Option<i64>,
    #[serde(default)]
    pub link: Option<String>,
}

impl ItemLink {
    /// The linked console to load in place, if this click should be
    /// intercepted. Links to consoles on a remote agent keep the default
    /// link behaviour.
    pub fn navigation_target(&self) -> Option<u64> {
        let id = self.linked_layout_id.filter(|id| *id > 0)?;
        let has_link = self.link.as_deref().is_some_and(|link| !link.is_empty());
        let remote = self.linked_layout_agent_id.is_some_and(|agent| agent != 0);

        if has_link && !remote {
            u64::try_from(id).ok()
        } else {
            None
        }
    }
}

/// Ids arrive as numbers, integral floats or numeric strings depending on the
/// item type. Null and empty strings mean unset.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let invalid = |value: &dyn std::fmt::Display| D::Error::custom(format!("invalid id: {}", value));

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| invalid(&n)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| invalid(&s)),
        Some(other) => Err(invalid(&other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickDisposition {
    /// The default link action was prevented and a navigation started.
    Intercepted,
    Default,
}
