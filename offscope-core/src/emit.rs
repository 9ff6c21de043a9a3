//! Serialisable document model for the output JSON.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::errors::Result;
use crate::model::ClassDefinition;

/// Root of the output document: one object per extracted class.
#[derive(Debug, Default, Serialize)]
pub struct Document {
    pub classes: BTreeMap<String, ClassJson>,
}

#[derive(Debug, Serialize)]
pub struct ClassJson {
    #[serde(rename = "baseClass")]
    pub base_class: Option<String>,
    pub fields: Vec<FieldJson>,
    pub vtable: Vec<VTableEntryJson>,
}

#[derive(Debug, Serialize)]
pub struct FieldJson {
    pub name: String,
    pub offset: u64,
    #[serde(rename = "arraySize")]
    pub array_size: Option<u64>,
    #[serde(rename = "type")]
    pub type_spelling: String,
    #[serde(rename = "amxxType")]
    pub amxx_type: String,
    pub unsigned: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct VTableEntryJson {
    pub name: String,
    #[serde(rename = "linkName")]
    pub link_name: Option<String>,
    pub index: u64,
}

impl Document {
    pub fn from_classes(classes: Vec<ClassDefinition>) -> Self {
        let mut document = Document::default();
        for class in classes {
            document.classes.insert(
                class.name,
                ClassJson {
                    base_class: class.base_class,
                    fields: class
                        .fields
                        .into_iter()
                        .map(|field| FieldJson {
                            name: field.name,
                            offset: field.offset,
                            array_size: field.array_size,
                            type_spelling: field.spelling,
                            amxx_type: field.runtime_type.as_str().to_string(),
                            unsigned: field.unsigned,
                        })
                        .collect(),
                    vtable: class
                        .vtable
                        .into_iter()
                        .map(|entry| VTableEntryJson {
                            name: entry.name,
                            link_name: entry.link_name,
                            index: entry.index,
                        })
                        .collect(),
                },
            );
        }
        document
    }

    /// Pretty-printed JSON with a trailing newline. Class keys iterate in
    /// sorted order, so equal inputs produce byte-identical output.
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::RuntimeType;
    use crate::model::{Field, VTableEntry};

    fn sample() -> Vec<ClassDefinition> {
        vec![ClassDefinition {
            name: "CCounter".into(),
            base_class: None,
            fields: vec![Field {
                name: "count".into(),
                offset: 0,
                array_size: None,
                spelling: "int count".into(),
                runtime_type: RuntimeType::Integer,
                unsigned: Some(false),
            }],
            vtable: vec![VTableEntry {
                name: "Spawn".into(),
                link_name: None,
                index: 0,
            }],
        }]
    }

    #[test]
    fn null_fields_are_emitted_not_omitted() {
        let document = Document::from_classes(sample());
        let json = document.to_json().unwrap();
        assert!(json.contains("\"arraySize\": null"), "{json}");
        assert!(json.contains("\"linkName\": null"), "{json}");
        assert!(json.contains("\"baseClass\": null"), "{json}");
        assert!(json.contains("\"amxxType\": \"integer\""), "{json}");
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn output_is_deterministic() {
        let a = Document::from_classes(sample()).to_json().unwrap();
        let b = Document::from_classes(sample()).to_json().unwrap();
        assert_eq!(a, b);
    }
}
