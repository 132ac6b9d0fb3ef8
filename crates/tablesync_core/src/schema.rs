use serde::{Deserialize, Serialize};

/// Role an attribute plays in a table's primary key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyRole {
    Partition,
    Sort,
}

/// Declared scalar type of a key attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyElement {
    pub attribute_name: String,
    pub role: KeyRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeSpec {
    pub attribute_name: String,
    pub attribute_type: AttributeType,
}

/// Provider-neutral view of a table's identity-defining schema. Non-key
/// attributes carry no declared type and are intentionally absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableKeyModel {
    pub key_schema: Vec<KeyElement>,
    pub attribute_definitions: Vec<AttributeSpec>,
}

impl TableKeyModel {
    /// Attribute definitions restricted to the attributes the key schema
    /// references, in original definition order. The provider rejects
    /// create requests declaring attributes no key or index uses.
    pub fn key_attribute_definitions(&self) -> Vec<AttributeSpec> {
        self.attribute_definitions
            .iter()
            .filter(|definition| {
                self.key_schema
                    .iter()
                    .any(|key| key.attribute_name == definition.attribute_name)
            })
            .cloned()
            .collect()
    }
}
