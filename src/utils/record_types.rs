// This file contains the user record structs as stored on disk and as read by callers.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::userdir_utils::title_case;

// ---------------------------------------------------------------------------
// StoredUser:
// ---------------------------------------------------------------------------
/// The persisted form of a user record.  Every field is required when
/// deserializing; a stored `name.full` is ignored and never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub username: String,
    pub name: StoredName,
    pub location: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredName {
    pub first: String,
    pub last: String,
}

// ---------------------------------------------------------------------------
// UserRecord:
// ---------------------------------------------------------------------------
/// The read projection of a stored user: full name derived and location
/// values title-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub username: String,
    pub name: FullName,
    pub location: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullName {
    pub first: String,
    pub last: String,
    pub full: String,
}

impl From<StoredUser> for UserRecord {
    fn from(stored: StoredUser) -> Self {
        let full = title_case(&format!("{} {}", stored.name.first, stored.name.last));
        let location = stored.location
            .into_iter()
            .map(|(k, v)| {
                let v = title_case(&v);
                (k, v)
            })
            .collect();

        UserRecord {
            username: stored.username,
            name: FullName {first: stored.name.first, last: stored.name.last, full},
            location,
        }
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str =
        r#"{"username":"alice","name":{"first":"alice","last":"smith"},"location":{"city":"nyc"}}"#;

    #[test]
    fn projection_derives_full_name_and_location() {
        let stored: StoredUser = serde_json::from_str(ALICE).unwrap();
        let rec = UserRecord::from(stored);
        assert_eq!(rec.name.full, "Alice Smith");
        assert_eq!(rec.name.first, "alice");
        assert_eq!(rec.location.get("city").map(String::as_str), Some("Nyc"));
    }

    #[test]
    fn stored_full_name_is_ignored() {
        let s = r#"{"username":"bob","name":{"first":"bob","last":"jones","full":"Mallory"},"location":{}}"#;
        let stored: StoredUser = serde_json::from_str(s).unwrap();
        let rec = UserRecord::from(stored.clone());
        assert_eq!(rec.name.full, "Bob Jones");

        let written = serde_json::to_string(&stored).unwrap();
        assert!(!written.contains("full"));
    }

    #[test]
    fn missing_fields_do_not_deserialize() {
        assert!(serde_json::from_str::<StoredUser>(r#"{"username":"x","name":{"first":"a","last":"b"}}"#).is_err());
        assert!(serde_json::from_str::<StoredUser>(r#"{"username":"x","name":{"first":"a"},"location":{}}"#).is_err());
        assert!(serde_json::from_str::<StoredUser>(r#"{"username":"x","name":{"first":"a","last":"b"},"location":{"zip":12345}}"#).is_err());
    }
}
