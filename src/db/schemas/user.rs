//! User document schema
//!
//! One record per registered account, written the first time a client
//! reports a successful sign-up with the identity provider. Deduplicated
//! on the provider's subject identifier.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    /// MongoDB document ID, assigned by the store on insert
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Email address, stamped from the verified identity
    pub email: String,

    /// Display name, stamped from the verified identity
    pub full_name: String,

    /// Optional avatar URL reported by the client at registration
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Provider-assigned subject identifier - the dedup key
    pub subject_id: String,

    /// Set once at first registration
    pub created_at: DateTime,
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // One record per subject, enforced by the store
        vec![(
            doc! { "subjectId": 1 },
            Some(
                IndexOptions::builder()
                    .name("subject_unique".to_string())
                    .unique(true)
                    .build(),
            ),
        )]
    }
}

/// Client-supplied fields for registration.
///
/// Everything else on the record is stamped from the verified identity;
/// identity-shaped fields in a registration body are discarded during
/// deserialization, so a client cannot register someone else's account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_doc_wire_names() {
        let user = UserDoc {
            id: None,
            email: "alice@x.com".into(),
            full_name: "Alice".into(),
            photo_url: Some("https://x.com/a.png".into()),
            subject_id: "uid-123".into(),
            created_at: DateTime::now(),
        };

        let doc = bson::to_document(&user).unwrap();
        for key in ["email", "fullName", "photoURL", "subjectId", "createdAt"] {
            assert!(doc.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_register_input_discards_identity_fields() {
        // The shape the original client sends after provider sign-up
        let body = r#"{
            "email": "mallory@x.com",
            "fullName": "Mallory",
            "photoURL": "https://x.com/m.png",
            "firebaseUID": "uid-999"
        }"#;

        let input: RegisterInput = serde_json::from_str(body).unwrap();
        assert_eq!(input.photo_url.as_deref(), Some("https://x.com/m.png"));
    }

    #[test]
    fn test_register_input_empty_body() {
        let input: RegisterInput = serde_json::from_str("{}").unwrap();
        assert!(input.photo_url.is_none());
    }
}
