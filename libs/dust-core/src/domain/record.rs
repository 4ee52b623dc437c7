use super::content_model::FieldName;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Fixed id of the only row a singleton structure may hold.
pub const SINGLETON_ID: i64 = 1;

/// One stored record: its id plus the model's current attributes in field order.
/// Attributes never written read back as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub id: i64,
    pub values: Vec<(String, Option<String>)>,
}

impl ContentRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.values.iter().any(|(key, _)| key == name)
    }
}

impl Serialize for ContentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Validated attribute writes, in the model's field order.
/// `None` clears an attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPayload {
    entries: Vec<(FieldName, Option<String>)>,
}

impl RecordPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: FieldName, value: Option<String>) {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FieldName, Option<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
