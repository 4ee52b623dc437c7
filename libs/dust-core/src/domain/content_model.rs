//! Content models: the runtime-defined schema of one kind of tenant content.
//!
//! `ModelSlug` and `FieldName` can only be constructed through validation, so any model
//! that reaches the storage engine carries identifiers that are safe to interpolate into
//! structural or data statements.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Column names the physical structure already uses or that SQLite treats specially.
const RESERVED_FIELD_NAMES: &[&str] = &["id", "rowid", "oid"];

// --- Identifiers ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelSlug(String);

impl ModelSlug {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_IDENTIFIER_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(CoreError::Validation(format!(
                "Model slug '{}' must be 1-{} characters of lowercase letters, numbers, and underscores",
                raw, MAX_IDENTIFIER_LEN
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the physical table backing this model.
    pub fn table_name(&self) -> String {
        format!("content_{}", self.0)
    }
}

impl TryFrom<String> for ModelSlug {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelSlug> for String {
    fn from(value: ModelSlug) -> Self {
        value.0
    }
}

impl fmt::Display for ModelSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let mut chars = raw.chars();
        let valid = raw.len() <= MAX_IDENTIFIER_LEN
            && chars.next().is_some_and(|c| c.is_ascii_lowercase())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(CoreError::Validation(format!(
                "Field name '{}' must start with a lowercase letter and contain only lowercase letters, numbers, and underscores (max {} characters)",
                raw, MAX_IDENTIFIER_LEN
            )));
        }
        if RESERVED_FIELD_NAMES.contains(&raw) {
            return Err(CoreError::Validation(format!(
                "Field name '{}' is reserved",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FieldName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Fields ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Markdown,
    Image,
    Date,
    Link,
    Tags,
}

impl FieldType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(FieldType::Text),
            "textarea" => Some(FieldType::Textarea),
            "markdown" => Some(FieldType::Markdown),
            "image" => Some(FieldType::Image),
            "date" => Some(FieldType::Date),
            "link" => Some(FieldType::Link),
            "tags" => Some(FieldType::Tags),
            _ => None,
        }
    }

    /// Kinds that accept a `max_length`.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::Textarea | FieldType::Markdown
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: FieldName,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

// --- Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Collection,
    Singleton,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Collection => "collection",
            ModelKind::Singleton => "singleton",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "collection" => Some(ModelKind::Collection),
            "singleton" => Some(ModelKind::Singleton),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentModel {
    pub slug: ModelSlug,
    pub name: String,
    pub kind: ModelKind,
    pub fields: Vec<Field>,
}

impl ContentModel {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    pub fn is_singleton(&self) -> bool {
        self.kind == ModelKind::Singleton
    }
}

// --- Unvalidated definitions, as received from administrators ---

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            required: false,
            label: None,
            max_length: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub slug: String,
    pub name: String,
    #[serde(alias = "type")]
    pub kind: ModelKind,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl ModelDefinition {
    pub fn validate(self) -> CoreResult<ContentModel> {
        let slug = ModelSlug::parse(&self.slug)?;
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("Model name cannot be empty".into()));
        }
        Ok(ContentModel {
            slug,
            name: self.name,
            kind: self.kind,
            fields: validate_fields(self.fields)?,
        })
    }
}

/// Validates an ordered field list. Order is preserved exactly.
pub fn validate_fields(definitions: Vec<FieldDefinition>) -> CoreResult<Vec<Field>> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(definitions.len());

    for def in definitions {
        let name = FieldName::parse(&def.name)?;
        if !seen.insert(name.clone()) {
            return Err(CoreError::Validation(format!(
                "Duplicate field name '{}'",
                name
            )));
        }
        let field_type = FieldType::parse(&def.field_type).ok_or_else(|| {
            CoreError::Validation(format!(
                "Unknown field type '{}' for field '{}'",
                def.field_type, name
            ))
        })?;
        if let Some(max) = def.max_length {
            if !field_type.is_text() {
                return Err(CoreError::Validation(format!(
                    "Field '{}' of type '{}' cannot have a max_length",
                    name, def.field_type
                )));
            }
            if max == 0 {
                return Err(CoreError::Validation(format!(
                    "Field '{}' max_length must be positive",
                    name
                )));
            }
        }
        fields.push(Field {
            name,
            field_type,
            required: def.required,
            label: def.label,
            max_length: def.max_length,
        });
    }

    Ok(fields)
}
