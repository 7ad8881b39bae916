//! Typed key, condition and update expressions.
//!
//! Expressions are rendered with generated `#nN` name and `:vN` value
//! placeholders, so attribute names never clash with reserved words. The
//! in-memory backend evaluates the same types directly against documents.

use std::collections::HashMap;

use serde_json::Value;

use crate::models::item::{Document, PARTITION_KEY, SORT_KEY};

/// Table index addressed by a query or scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Index {
    /// The table itself (PK / SK)
    #[default]
    Primary,
    /// First global secondary index (GSI1PK / GSI1SK)
    Gsi1,
    /// Second global secondary index (GSI2PK / GSI2SK)
    Gsi2,
}

impl Index {
    /// Index name sent to the store; `None` for the table itself
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Index::Primary => None,
            Index::Gsi1 => Some("GSI1"),
            Index::Gsi2 => Some("GSI2"),
        }
    }

    pub fn partition_attribute(&self) -> &'static str {
        match self {
            Index::Primary => PARTITION_KEY,
            Index::Gsi1 => "GSI1PK",
            Index::Gsi2 => "GSI2PK",
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self {
            Index::Primary => SORT_KEY,
            Index::Gsi1 => "GSI1SK",
            Index::Gsi2 => "GSI2SK",
        }
    }
}

/// Condition on the sort key of a query
#[derive(Debug, Clone, PartialEq)]
pub enum SortKeyCondition {
    Equals(String),
    BeginsWith(String),
    /// Inclusive on both ends
    Between(String, String),
    LessThan(String),
    LessThanOrEqual(String),
    GreaterThan(String),
    GreaterThanOrEqual(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::Equals(v) => sort_key == v,
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyCondition::Between(low, high) => {
                sort_key >= low.as_str() && sort_key <= high.as_str()
            }
            SortKeyCondition::LessThan(v) => sort_key < v.as_str(),
            SortKeyCondition::LessThanOrEqual(v) => sort_key <= v.as_str(),
            SortKeyCondition::GreaterThan(v) => sort_key > v.as_str(),
            SortKeyCondition::GreaterThanOrEqual(v) => sort_key >= v.as_str(),
        }
    }
}

/// Condition or filter expression over item attributes
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, Value),
    NotEquals(String, Value),
    BeginsWith(String, String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    /// Holds only when no item with the written key exists yet
    pub fn item_absent() -> Self {
        Condition::And(vec![
            Condition::AttributeNotExists(PARTITION_KEY.to_string()),
            Condition::AttributeNotExists(SORT_KEY.to_string()),
        ])
    }

    /// Holds only when an item with the addressed key exists
    pub fn item_exists() -> Self {
        Condition::AttributeExists(PARTITION_KEY.to_string())
    }

    /// Conjunction of `self` and `other`
    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut parts) => {
                parts.push(other);
                Condition::And(parts)
            }
            single => Condition::And(vec![single, other]),
        }
    }

    /// True when the condition can only hold for an existing item
    pub fn requires_existing_item(&self) -> bool {
        match self {
            Condition::AttributeExists(name) => name == PARTITION_KEY,
            Condition::And(parts) => parts.iter().any(Condition::requires_existing_item),
            _ => false,
        }
    }

    /// Evaluate against a stored item; an absent item is an empty document
    pub fn matches(&self, item: &Document) -> bool {
        match self {
            Condition::AttributeExists(name) => item.contains_key(name),
            Condition::AttributeNotExists(name) => !item.contains_key(name),
            Condition::Equals(name, value) => item.get(name) == Some(value),
            Condition::NotEquals(name, value) => {
                item.get(name).map_or(false, |current| current != value)
            }
            Condition::BeginsWith(name, prefix) => item
                .get(name)
                .and_then(Value::as_str)
                .map_or(false, |current| current.starts_with(prefix.as_str())),
            Condition::And(parts) => parts.iter().all(|part| part.matches(item)),
            Condition::Or(parts) => parts.iter().any(|part| part.matches(item)),
        }
    }
}

/// Accumulates placeholders while rendering expressions for one request
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    placeholders: HashMap<String, String>,
    values: HashMap<String, Value>,
}

impl ExpressionBuilder {
    fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.placeholders.get(attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.placeholders.insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Render a condition or filter expression
    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::AttributeExists(attribute) => {
                format!("attribute_exists({})", self.name(attribute))
            }
            Condition::AttributeNotExists(attribute) => {
                format!("attribute_not_exists({})", self.name(attribute))
            }
            Condition::Equals(attribute, value) => {
                let name = self.name(attribute);
                let value = self.value(value.clone());
                format!("{name} = {value}")
            }
            Condition::NotEquals(attribute, value) => {
                let name = self.name(attribute);
                let value = self.value(value.clone());
                format!("{name} <> {value}")
            }
            Condition::BeginsWith(attribute, prefix) => {
                let name = self.name(attribute);
                let value = self.value(Value::String(prefix.clone()));
                format!("begins_with({name}, {value})")
            }
            Condition::And(parts) => self.join(parts, " AND "),
            Condition::Or(parts) => self.join(parts, " OR "),
        }
    }

    fn join(&mut self, parts: &[Condition], separator: &str) -> String {
        let rendered: Vec<String> = parts
            .iter()
            .map(|part| match part {
                Condition::And(_) | Condition::Or(_) => format!("({})", self.condition(part)),
                _ => self.condition(part),
            })
            .collect();
        rendered.join(separator)
    }

    /// Render `{pk} = :pk [AND <sort key condition>]` for an index
    pub fn key_condition(
        &mut self,
        index: Index,
        pk: &str,
        sk_condition: Option<&SortKeyCondition>,
    ) -> String {
        let pk_name = self.name(index.partition_attribute());
        let pk_value = self.value(Value::String(pk.to_string()));
        let pk_expression = format!("{pk_name} = {pk_value}");

        let Some(sk_condition) = sk_condition else {
            return pk_expression;
        };

        let sk = self.name(index.sort_attribute());
        let sk_expression = match sk_condition {
            SortKeyCondition::Equals(v) => format!("{sk} = {}", self.string_value(v)),
            SortKeyCondition::BeginsWith(v) => {
                format!("begins_with({sk}, {})", self.string_value(v))
            }
            SortKeyCondition::Between(low, high) => {
                let low = self.string_value(low);
                let high = self.string_value(high);
                format!("{sk} BETWEEN {low} AND {high}")
            }
            SortKeyCondition::LessThan(v) => format!("{sk} < {}", self.string_value(v)),
            SortKeyCondition::LessThanOrEqual(v) => format!("{sk} <= {}", self.string_value(v)),
            SortKeyCondition::GreaterThan(v) => format!("{sk} > {}", self.string_value(v)),
            SortKeyCondition::GreaterThanOrEqual(v) => {
                format!("{sk} >= {}", self.string_value(v))
            }
        };

        format!("{pk_expression} AND {sk_expression}")
    }

    fn string_value(&mut self, value: &str) -> String {
        self.value(Value::String(value.to_string()))
    }

    /// Render `SET #a = :a, ... REMOVE #b, ...`
    pub fn update(&mut self, set: &Document, remove: &[String]) -> String {
        let mut clauses = Vec::new();

        if !set.is_empty() {
            let assignments: Vec<String> = set
                .iter()
                .map(|(attribute, value)| {
                    let name = self.name(attribute);
                    let value = self.value(value.clone());
                    format!("{name} = {value}")
                })
                .collect();
            clauses.push(format!("SET {}", assignments.join(", ")));
        }

        if !remove.is_empty() {
            let names: Vec<String> = remove.iter().map(|attribute| self.name(attribute)).collect();
            clauses.push(format!("REMOVE {}", names.join(", ")));
        }

        clauses.join(" ")
    }

    /// Placeholder maps; `None` when empty since the store rejects empty maps
    pub fn into_parts(self) -> (Option<HashMap<String, String>>, Option<HashMap<String, Value>>) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}
