use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::value_type::ValueType;

/// Name of the synthetic field a `flags:#` marker declares.
pub const FLAGS_FIELD: &str = "flags";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:     String,
    #[serde(rename = "type")]
    pub ty:       ValueType,
    pub flag_bit: Option<u8>,
}

impl Field {
    pub fn is_conditional(&self) -> bool {
        self.flag_bit.is_some()
    }
}

/// One schema line, immutable once the assembler has seen its return clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    pub key:            String,
    pub constructor_id: u32,
    pub fields:         Vec<Field>,
    pub return_type:    ValueType,
    pub line:           usize,
    pub column:         usize,
}

impl TypeDefinition {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Abstract return-type key to the concrete definitions returning it, both
/// in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChildMap {
    buckets: IndexMap<String, IndexSet<String>>,
}

impl ChildMap {
    pub fn new() -> ChildMap {
        ChildMap::default()
    }

    pub fn insert(&mut self, abstract_key: &str, concrete_key: &str) {
        self.buckets
            .entry(abstract_key.to_string())
            .or_default()
            .insert(concrete_key.to_string());
    }

    pub fn get(&self, abstract_key: &str) -> Option<&IndexSet<String>> {
        self.buckets.get(abstract_key)
    }

    /// The first bucket whose key contains `key`, ignoring case.
    pub fn find_family(&self, key: &str) -> Option<(&str, &IndexSet<String>)> {
        let needle = key.to_lowercase();
        self.buckets
            .iter()
            .find(|(bucket, _)| bucket.to_lowercase().contains(&needle))
            .map(|(bucket, members)| (bucket.as_str(), members))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.buckets.iter().map(|(key, members)| (key.as_str(), members))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub definitions: Vec<TypeDefinition>,
    pub child_map:   ChildMap,
}

impl Schema {
    pub fn find(&self, key: &str) -> Option<&TypeDefinition> {
        self.definitions.iter().find(|def| def.key == key)
    }
}
