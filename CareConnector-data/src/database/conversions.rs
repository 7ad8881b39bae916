//! Conversions between JSON documents and DynamoDB attribute maps.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Number, Value};

use crate::models::item::{Document, ItemKey, PARTITION_KEY, SORT_KEY};
use crate::repository::errors::RepositoryError;

/// Raw DynamoDB item
pub type Item = HashMap<String, AttributeValue>;

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

pub fn from_attribute_value(value: &AttributeValue) -> Result<Value, RepositoryError> {
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(from_attribute_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| from_attribute_value(v).map(|v| (k.clone(), v)))
                .collect::<Result<Document, RepositoryError>>()?,
        ),
        AttributeValue::Ss(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AttributeValue::B(blob) => bytes_to_value(blob.as_ref()),
        AttributeValue::Bs(blobs) => {
            Value::Array(blobs.iter().map(|blob| bytes_to_value(blob.as_ref())).collect())
        }
        other => {
            return Err(RepositoryError::Conversion(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

fn bytes_to_value(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

fn parse_number(raw: &str) -> Result<Number, RepositoryError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Number::from(i));
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Ok(Number::from(u));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| RepositoryError::Conversion(format!("Invalid number: {}", raw)))
}

pub fn document_to_item(document: &Document) -> Item {
    document
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute_value(v)))
        .collect()
}

pub fn item_to_document(item: &Item) -> Result<Document, RepositoryError> {
    item.iter()
        .map(|(k, v)| from_attribute_value(v).map(|v| (k.clone(), v)))
        .collect()
}

pub fn key_to_item(key: &ItemKey) -> Item {
    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(key.pk.clone())),
        (SORT_KEY.to_string(), AttributeValue::S(key.sk.clone())),
    ])
}

pub fn item_to_key(item: &Item) -> Result<ItemKey, RepositoryError> {
    let get = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .ok_or_else(|| RepositoryError::Conversion(format!("Missing or invalid key attribute: {}", name)))
    };
    Ok(ItemKey::new(get(PARTITION_KEY)?, get(SORT_KEY)?))
}

/// Convert expression placeholder values
pub fn values_to_attributes(values: HashMap<String, Value>) -> HashMap<String, AttributeValue> {
    values
        .into_iter()
        .map(|(k, v)| (k, to_attribute_value(&v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_document_conversion() {
        let doc = json!({
            "PK": "PATIENT#1",
            "count": 3,
            "score": 4.5,
            "active": true,
            "notes": null,
            "medical_info": {"allergies": ["peanuts"], "insurance": {"provider": ""}}
        });
        let doc = doc.as_object().unwrap().clone();

        let item = document_to_item(&doc);
        assert_eq!(item.get("PK"), Some(&AttributeValue::S("PATIENT#1".into())));
        assert_eq!(item.get("count"), Some(&AttributeValue::N("3".into())));
        assert_eq!(item.get("notes"), Some(&AttributeValue::Null(true)));

        let back = item_to_document(&item).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_string_and_number_sets() {
        let value = from_attribute_value(&AttributeValue::Ss(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(value, json!(["a", "b"]));

        let value = from_attribute_value(&AttributeValue::Ns(vec!["1".into(), "2.5".into()])).unwrap();
        assert_eq!(value, json!([1, 2.5]));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = from_attribute_value(&AttributeValue::N("abc".into())).unwrap_err();
        assert!(matches!(err, RepositoryError::Conversion(_)));
    }

    #[test]
    fn test_key_round_trip() {
        let key = ItemKey::new("PATIENT#1", "PROFILE");
        assert_eq!(item_to_key(&key_to_item(&key)).unwrap(), key);
    }
}
