//! Key conventions for the single-table layout.
//!
//! Key patterns:
//! - Patient profile: PK=`PATIENT#<user_id>`, SK=`PROFILE`
//! - Medical record:  PK=`PATIENT#<user_id>`, SK=`RECORD#<timestamp>#<record_id>`
//! - Agent index:     GSI1PK=`AGENT#<agent_email>`, GSI1SK=`PATIENT#<user_id>`

use crate::models::item::ItemKey;

pub const PATIENT_PREFIX: &str = "PATIENT#";
pub const PROFILE_SK: &str = "PROFILE";
pub const RECORD_PREFIX: &str = "RECORD#";
pub const AGENT_PREFIX: &str = "AGENT#";

pub const GSI1_PK: &str = "GSI1PK";
pub const GSI1_SK: &str = "GSI1SK";

pub fn patient_pk(patient_id: &str) -> String {
    format!("{PATIENT_PREFIX}{patient_id}")
}

pub fn profile_key(patient_id: &str) -> ItemKey {
    ItemKey::new(patient_pk(patient_id), PROFILE_SK)
}

pub fn medical_record_sk(timestamp: &str, record_id: &str) -> String {
    format!("{RECORD_PREFIX}{timestamp}#{record_id}")
}

pub fn agent_gsi1_pk(agent_email: &str) -> String {
    format!("{AGENT_PREFIX}{agent_email}")
}

pub fn patient_gsi1_sk(patient_id: &str) -> String {
    patient_pk(patient_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_keys() {
        let key = profile_key("auth0|abc");
        assert_eq!(key.pk, "PATIENT#auth0|abc");
        assert_eq!(key.sk, "PROFILE");
    }

    #[test]
    fn test_medical_record_sk() {
        assert_eq!(
            medical_record_sk("2024-01-01T10:00:00Z", "uuid-123"),
            "RECORD#2024-01-01T10:00:00Z#uuid-123"
        );
    }

    #[test]
    fn test_agent_index_keys() {
        assert_eq!(agent_gsi1_pk("care@agentmail.to"), "AGENT#care@agentmail.to");
        assert_eq!(patient_gsi1_sk("u1"), "PATIENT#u1");
    }
}
