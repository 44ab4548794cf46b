// Visual console domain model
use serde_json::Value;
use thiserror::Error;

/// A payload as returned by the console API.
///
/// The backend sometimes answers with a JSON string that itself holds JSON
/// text, and sometimes with the structure directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Encoded(String),
    Structured(Value),
}

impl Payload {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => Payload::Encoded(text),
            other => Payload::Structured(other),
        }
    }

    pub fn decode(self) -> Result<Value, serde_json::Error> {
        match self {
            Payload::Encoded(text) => serde_json::from_str(&text),
            Payload::Structured(value) => Ok(value),
        }
    }
}

/// Joined result of a console load: both roles are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleData {
    pub properties: Payload,
    pub items: Payload,
}

impl ConsoleData {
    pub fn new(properties: Payload, items: Payload) -> Self {
        Self { properties, items }
    }

    pub fn decode(self) -> Result<DecodedConsole, DecodeError> {
        let properties = self
            .properties
            .decode()
            .map_err(|source| DecodeError::Json { role: "properties", source })?;
        let items = self
            .items
            .decode()
            .map_err(|source| DecodeError::Json { role: "items", source })?;

        if !properties.is_object() {
            return Err(DecodeError::PropertiesNotAnObject);
        }
        match items {
            Value::Array(items) => Ok(DecodedConsole { properties, items }),
            _ => Err(DecodeError::ItemsNotAList),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedConsole {
    pub properties: Value,
    pub items: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {role} payload: {source}")]
    Json {
        role: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("properties payload is not an object")]
    PropertiesNotAnObject,
    #[error("items payload is not a list")]
    ItemsNotAList,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("invalid visual console properties: {0}")]
    InvalidProperties(&'static str),
    #[error("invalid visual console items: expected a list")]
    InvalidItems,
}

/// The live view of one visual console. Mutated in place on every update.
#[derive(Debug, Clone)]
pub struct VisualConsole {
    id: u64,
    props: Value,
    items: Vec<Value>,
}

impl VisualConsole {
    pub fn new(props: Value, items: Value) -> Result<Self, ConsoleError> {
        if !props.is_object() {
            return Err(ConsoleError::InvalidProperties("expected an object"));
        }
        let id = console_id(&props).ok_or(ConsoleError::InvalidProperties(
            "missing a positive `id`",
        ))?;
        let Value::Array(items) = items else {
            return Err(ConsoleError::InvalidItems);
        };

        Ok(Self { id, props, items })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Swap in new properties and items, returning the previous properties.
    /// The identifier follows the new properties when they carry one.
    pub fn replace(&mut self, props: Value, items: Vec<Value>) -> Value {
        if let Some(id) = console_id(&props) {
            self.id = id;
        }
        self.items = items;
        std::mem::replace(&mut self.props, props)
    }
}

/// Read a positive console id from a properties object. The API encodes it
/// either as a number or as a numeric string.
pub fn console_id(props: &Value) -> Option<u64> {
    let id = match props.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}
