//! Habit document schema
//!
//! The sole entity of the system. Field names on the wire are camelCase,
//! matching the documents the original collection holds.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::IntoIndexes;

/// Collection name for habits
pub const HABIT_COLLECTION: &str = "habits";

/// Habit category. Membership is enforced by the type: anything outside
/// this set fails deserialization.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Morning,
    Work,
    Fitness,
    Evening,
    Study,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Morning => "Morning",
            Category::Work => "Work",
            Category::Fitness => "Fitness",
            Category::Evening => "Evening",
            Category::Study => "Study",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Morning" => Ok(Category::Morning),
            "Work" => Ok(Category::Work),
            "Fitness" => Ok(Category::Fitness),
            "Evening" => Ok(Category::Evening),
            "Study" => Ok(Category::Study),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Habit document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HabitDoc {
    /// MongoDB document ID, assigned by the store on insert
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub title: String,

    pub description: String,

    pub category: Category,

    /// Reminder time of day, stored as opaque text (e.g. "18:00")
    pub reminder_time: String,

    /// Optional image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Owner's email - stamped from the authenticated identity at
    /// creation, immutable afterward
    pub owner_email: String,

    /// Owner's display name, stamped at creation
    pub owner_name: String,

    /// Public habits are readable by anyone; private ones only by the owner
    pub is_public: bool,

    /// Raw completion timestamps, append-only, at most one per calendar day
    #[serde(default)]
    pub completion_history: Vec<DateTime>,

    /// Set once at creation; the sole recency sort key
    pub created_at: DateTime,
}

impl IntoIndexes for HabitDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Public listings sort by recency
            (
                doc! { "isPublic": 1, "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("public_recency".to_string())
                        .build(),
                ),
            ),
            // Owner dashboard lookups
            (
                doc! { "ownerEmail": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_email_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

/// Client-supplied fields for habit creation.
///
/// Explicit schema: unknown fields are rejected rather than persisted, and
/// the server-stamped fields (owner, timestamps) have no representation
/// here at all.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateHabitInput {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub reminder_time: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Defaults to true when absent
    #[serde(default)]
    pub is_public: Option<bool>,
}

/// Partial update for a habit.
///
/// Only the mutable fields exist in this type; `ownerEmail`, `ownerName`
/// and `createdAt` in a client patch are discarded during deserialization,
/// so they can never reach the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl HabitPatch {
    /// True when the patch names no fields at all
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.reminder_time.is_none()
            && self.image.is_none()
            && self.is_public.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for name in ["Morning", "Work", "Fitness", "Evening", "Study"] {
            let cat: Category = name.parse().unwrap();
            assert_eq!(cat.to_string(), name);
        }
        assert!("Afternoon".parse::<Category>().is_err());
    }

    #[test]
    fn test_create_input_rejects_unknown_fields() {
        let body = r#"{
            "title": "Morning Run",
            "description": "5k before work",
            "category": "Fitness",
            "reminderTime": "06:30",
            "ownerEmail": "mallory@x.com"
        }"#;
        assert!(serde_json::from_str::<CreateHabitInput>(body).is_err());
    }

    #[test]
    fn test_patch_discards_protected_fields() {
        let body = r#"{
            "title": "New title",
            "ownerEmail": "mallory@x.com",
            "ownerName": "Mallory",
            "createdAt": "2020-01-01T00:00:00Z"
        }"#;
        let patch: HabitPatch = serde_json::from_str(body).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New title"));

        // The $set document built from the patch carries only mutable fields
        let set = bson::to_document(&patch).unwrap();
        assert!(set.contains_key("title"));
        assert!(!set.contains_key("ownerEmail"));
        assert!(!set.contains_key("ownerName"));
        assert!(!set.contains_key("createdAt"));
    }

    #[test]
    fn test_patch_empty() {
        let patch: HabitPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_habit_doc_wire_names() {
        let habit = HabitDoc {
            id: None,
            title: "Read".into(),
            description: "20 pages".into(),
            category: Category::Study,
            reminder_time: "21:00".into(),
            image: None,
            owner_email: "alice@x.com".into(),
            owner_name: "Alice".into(),
            is_public: true,
            completion_history: vec![],
            created_at: DateTime::now(),
        };

        let doc = bson::to_document(&habit).unwrap();
        for key in [
            "title",
            "description",
            "category",
            "reminderTime",
            "ownerEmail",
            "ownerName",
            "isPublic",
            "completionHistory",
            "createdAt",
        ] {
            assert!(doc.contains_key(key), "missing {}", key);
        }
    }
}
