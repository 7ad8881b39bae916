use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use care_connector_data::models::Document;

/// Personal fields a complete profile must carry
pub const REQUIRED_PERSONAL_FIELDS: [&str; 4] = ["date_of_birth", "gender", "phone", "address"];

/// Fields an emergency contact must carry when one is given
pub const REQUIRED_EMERGENCY_FIELDS: [&str; 3] = ["name", "phone", "relationship"];

/// Attributes clients may never write directly
pub const RESERVED_ATTRIBUTES: [&str; 10] = [
    "user_id", "PK", "SK", "EntityType", "PatientId", "ItemId", "CreatedAt", "UpdatedAt", "GSI1PK",
    "GSI1SK",
];

/// Result of the first-login initialization
#[derive(Debug, Clone, PartialEq)]
pub struct Initialization {
    pub profile: Document,
    /// False when the profile already existed
    pub created: bool,
}

/// Request payload for a new medical record
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMedicalRecordRequest {
    /// Kind of record, e.g. "lab_result" or "visit_summary"
    #[validate(length(min = 1, max = 64, message = "Record type is required"))]
    pub record_type: String,

    /// Short title shown in record lists
    #[validate(length(max = 200, message = "Title cannot exceed 200 characters"))]
    pub title: Option<String>,

    /// Provider who issued the record
    pub provider: Option<String>,

    /// Date of the underlying event
    pub date: Option<String>,

    #[validate(length(max = 5000, message = "Notes cannot exceed 5000 characters"))]
    pub notes: Option<String>,

    /// Free-form structured content
    #[schema(value_type = Object)]
    pub details: Option<Value>,
}

impl CreateMedicalRecordRequest {
    /// Attributes stored on the record item
    pub fn into_document(self) -> Document {
        let mut doc = Document::new();
        doc.insert("record_type".into(), Value::String(self.record_type));
        let optional = [
            ("title", self.title.map(Value::String)),
            ("provider", self.provider.map(Value::String)),
            ("date", self.date.map(Value::String)),
            ("notes", self.notes.map(Value::String)),
            ("details", self.details),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                doc.insert(name.to_string(), value);
            }
        }
        doc
    }
}

pub fn default_medical_info() -> Value {
    json!({
        "allergies": [],
        "medications": [],
        "conditions": [],
        "insurance": {"provider": "", "policy_number": ""}
    })
}

pub fn default_preferences() -> Value {
    json!({
        "communication_method": "email",
        "appointment_reminders": true,
        "health_tips": false
    })
}

/// Overlay `provided` on `defaults`, one level deep
pub fn merge_over(defaults: Value, provided: Option<&Value>) -> Value {
    let mut merged: Map<String, Value> = match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(Value::Object(provided)) = provided {
        for (key, value) in provided {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Medical info over defaults, with insurance merged one level deeper
pub fn merge_medical_info(provided: Option<&Value>) -> Value {
    let defaults = default_medical_info();
    let default_insurance = defaults["insurance"].clone();
    let mut merged = merge_over(defaults, provided);

    if let Some(insurance) = provided.and_then(|p| p.get("insurance")) {
        merged["insurance"] = merge_over(default_insurance, Some(insurance));
    }
    merged
}

/// Falsy JSON values count as missing
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

/// Names of `fields` that are blank in `section`
pub fn missing_fields(section: &Value, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter(|field| is_blank(section.get(**field)))
        .map(|field| field.to_string())
        .collect()
}

/// First and last name for inbox display, defaulting to "Patient User"
pub fn split_display_name(name: Option<&str>) -> (String, String) {
    let name = name.map(str::trim).unwrap_or("");
    let first = name
        .split(' ')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("Patient");
    let last = if name.contains(' ') {
        name.rsplit(' ').next().unwrap_or("User")
    } else {
        "User"
    };
    (first.to_string(), last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medical_info_merge_keeps_default_insurance_fields() {
        let provided = json!({"allergies": ["peanuts"], "insurance": {"provider": "Acme"}});
        let merged = merge_medical_info(Some(&provided));

        assert_eq!(merged["allergies"], json!(["peanuts"]));
        assert_eq!(merged["medications"], json!([]));
        assert_eq!(merged["insurance"], json!({"provider": "Acme", "policy_number": ""}));
    }

    #[test]
    fn test_preferences_merge() {
        let merged = merge_over(default_preferences(), Some(&json!({"health_tips": true})));
        assert_eq!(merged["health_tips"], json!(true));
        assert_eq!(merged["communication_method"], json!("email"));
        assert_eq!(merge_over(default_preferences(), None), default_preferences());
    }

    #[test]
    fn test_missing_fields_treats_falsy_as_missing() {
        let section = json!({"date_of_birth": "1990-01-01", "gender": "", "phone": null});
        assert_eq!(
            missing_fields(&section, &REQUIRED_PERSONAL_FIELDS),
            vec!["gender", "phone", "address"]
        );
    }

    #[test]
    fn test_split_display_name() {
        assert_eq!(split_display_name(Some("Ada Lovelace")), ("Ada".into(), "Lovelace".into()));
        assert_eq!(split_display_name(Some("Ada")), ("Ada".into(), "User".into()));
        assert_eq!(split_display_name(Some("Ada King Lovelace")), ("Ada".into(), "Lovelace".into()));
        assert_eq!(split_display_name(None), ("Patient".into(), "User".into()));
    }

    #[test]
    fn test_record_request_document() {
        let request = CreateMedicalRecordRequest {
            record_type: "lab_result".into(),
            title: Some("CBC".into()),
            provider: None,
            date: None,
            notes: None,
            details: Some(json!({"wbc": 5.2})),
        };
        assert!(request.validate().is_ok());

        let doc = request.into_document();
        assert_eq!(doc["record_type"], json!("lab_result"));
        assert_eq!(doc["details"]["wbc"], json!(5.2));
        assert!(!doc.contains_key("provider"));
    }
}
