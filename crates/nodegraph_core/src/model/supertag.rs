//! SuperTag and typed field definitions attached to nodes.

use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Value type of a supertag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Reference,
    Select,
    MultiSelect,
    Url,
}

impl FieldType {
    /// Whether the field draws its values from `options`.
    pub fn is_select(self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect)
    }
}

/// One typed field inside a supertag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Field {
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type,
            options: Vec::new(),
            required: false,
            value: None,
        }
    }
}

/// Named, reusable bundle of typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperTag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl SuperTag {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            fields: Vec::new(),
        }
    }

    /// Checks ids/names are present and field ids are unique.
    ///
    /// Select fields with a value must pick from their declared options.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::InvalidSuperTag(
                "supertag id must not be blank".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidSuperTag(format!(
                "supertag `{}` has a blank name",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.id.trim().is_empty() || field.name.trim().is_empty() {
                return Err(ValidationError::InvalidSuperTag(format!(
                    "supertag `{}` has a field with blank id or name",
                    self.id
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(ValidationError::InvalidSuperTag(format!(
                    "supertag `{}` repeats field id `{}`",
                    self.id, field.id
                )));
            }
            if field.field_type.is_select() {
                validate_select_value(self, field)?;
            }
        }
        Ok(())
    }
}

fn validate_select_value(tag: &SuperTag, field: &Field) -> Result<(), ValidationError> {
    let not_strings = || {
        ValidationError::InvalidSuperTag(format!(
            "field `{}` of supertag `{}` must hold option strings",
            field.id, tag.id
        ))
    };
    let picked: Vec<&str> = match &field.value {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(value)) => vec![value.as_str()],
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| value.as_str().ok_or_else(not_strings))
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(not_strings()),
    };

    if let Some(unknown) = picked
        .iter()
        .find(|value| !field.options.iter().any(|option| option.as_str() == **value))
    {
        return Err(ValidationError::InvalidSuperTag(format!(
            "field `{}` of supertag `{}` has value `{unknown}` outside its options",
            field.id, tag.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Field, FieldType, SuperTag};
    use crate::model::ValidationError;
    use serde_json::json;

    #[test]
    fn field_type_uses_kebab_case_names() {
        let raw = serde_json::to_string(&FieldType::MultiSelect).unwrap();
        assert_eq!(raw, "\"multi-select\"");
    }

    #[test]
    fn duplicate_field_ids_are_rejected() {
        let mut tag = SuperTag::new("book", "Book");
        tag.fields.push(Field::new("author", "Author", FieldType::Text));
        tag.fields.push(Field::new("author", "Writer", FieldType::Text));

        let err = tag.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSuperTag(msg) if msg.contains("author")));
    }

    #[test]
    fn select_value_must_be_declared_option() {
        let mut field = Field::new("status", "Status", FieldType::Select);
        field.options = vec!["reading".to_string(), "done".to_string()];
        field.value = Some(json!("abandoned"));
        let mut tag = SuperTag::new("book", "Book");
        tag.fields.push(field);

        assert!(tag.validate().is_err());

        tag.fields[0].value = Some(json!("done"));
        assert!(tag.validate().is_ok());
    }

    #[test]
    fn multi_select_rejects_non_string_entries() {
        let mut field = Field::new("labels", "Labels", FieldType::MultiSelect);
        field.options = vec!["done".to_string(), "urgent".to_string()];
        field.value = Some(json!([1, "done"]));
        let mut tag = SuperTag::new("ticket", "Ticket");
        tag.fields.push(field);

        let err = tag.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSuperTag(msg) if msg.contains("option strings")));

        tag.fields[0].value = Some(json!(["urgent", "done"]));
        assert!(tag.validate().is_ok());
    }
}
