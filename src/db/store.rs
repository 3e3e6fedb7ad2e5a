//! Habit store seam
//!
//! The engine talks to the document store through [`HabitStore`]: filtered
//! retrieval sorted by creation time, insert, and conditional writes whose
//! filters embed the ownership and same-day checks. Putting the condition
//! into the filter makes each mutation a single atomic store operation, so
//! two interleaved requests cannot both pass a check before either writes.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{Category, HabitDoc, HabitPatch, HABIT_COLLECTION};
use crate::types::{HabitError, Result};

/// A filtered habit listing. Results are always sorted by `createdAt`
/// descending; ties break on `_id` so a given store state yields a stable
/// order.
#[derive(Debug, Clone, Default)]
pub struct HabitQuery {
    /// Keep only habits with `isPublic = true`
    pub public_only: bool,
    /// Keep only habits owned by this email
    pub owner_email: Option<String>,
    /// Case-insensitive substring match over title OR description
    pub search: Option<String>,
    /// Exact category match
    pub category: Option<Category>,
    /// Result-set cap; `None` returns everything
    pub limit: Option<i64>,
}

#[async_trait]
pub trait HabitStore: Send + Sync {
    /// Insert a habit, returning the store-assigned id
    async fn insert(&self, habit: HabitDoc) -> Result<ObjectId>;

    /// Fetch one habit by id
    async fn find_by_id(&self, id: ObjectId) -> Result<Option<HabitDoc>>;

    /// List habits matching the query, newest first
    async fn list(&self, query: HabitQuery) -> Result<Vec<HabitDoc>>;

    /// Apply the patch to the habit matching BOTH id and owner. Returns
    /// whether a record matched (false: vanished or not owned).
    async fn update_fields(
        &self,
        id: ObjectId,
        owner_email: &str,
        patch: &HabitPatch,
    ) -> Result<bool>;

    /// Permanently remove the habit matching BOTH id and owner. Returns
    /// whether a record was removed.
    async fn delete(&self, id: ObjectId, owner_email: &str) -> Result<bool>;

    /// Append `at` to the completion history iff the habit matches id and
    /// owner AND has no entry within `[day_start, day_end)`. Returns
    /// whether the append happened.
    async fn push_completion(
        &self,
        id: ObjectId,
        owner_email: &str,
        at: DateTime,
        day_start: DateTime,
        day_end: DateTime,
    ) -> Result<bool>;
}

/// MongoDB-backed habit store
#[derive(Clone)]
pub struct MongoHabitStore {
    collection: MongoCollection<HabitDoc>,
}

impl MongoHabitStore {
    /// Open the habits collection (applies schema indexes)
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<HabitDoc>(HABIT_COLLECTION).await?;
        Ok(Self { collection })
    }

    fn build_filter(query: &HabitQuery) -> Document {
        let mut filter = Document::new();

        if query.public_only {
            filter.insert("isPublic", true);
        }
        if let Some(ref owner) = query.owner_email {
            filter.insert("ownerEmail", owner);
        }
        if let Some(cat) = query.category {
            filter.insert("category", cat.to_string());
        }
        if let Some(ref search) = query.search {
            let pattern = escape_regex(search);
            filter.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": &pattern, "$options": "i" } },
                    doc! { "description": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }

        filter
    }
}

#[async_trait]
impl HabitStore for MongoHabitStore {
    async fn insert(&self, habit: HabitDoc) -> Result<ObjectId> {
        self.collection.insert_one(habit).await
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<HabitDoc>> {
        self.collection.find_one(doc! { "_id": id }).await
    }

    async fn list(&self, query: HabitQuery) -> Result<Vec<HabitDoc>> {
        let filter = Self::build_filter(&query);
        self.collection
            .find_many(filter, doc! { "createdAt": -1, "_id": -1 }, query.limit)
            .await
    }

    async fn update_fields(
        &self,
        id: ObjectId,
        owner_email: &str,
        patch: &HabitPatch,
    ) -> Result<bool> {
        let fields = bson::to_document(patch)
            .map_err(|e| HabitError::Database(format!("Failed to encode patch: {}", e)))?;
        if fields.is_empty() {
            // Nothing to set; existence was already established by the caller
            return Ok(true);
        }

        let result = self
            .collection
            .update_one(
                doc! { "_id": id, "ownerEmail": owner_email },
                doc! { "$set": fields },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: ObjectId, owner_email: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "ownerEmail": owner_email })
            .await?;

        Ok(result.deleted_count > 0)
    }

    async fn push_completion(
        &self,
        id: ObjectId,
        owner_email: &str,
        at: DateTime,
        day_start: DateTime,
        day_end: DateTime,
    ) -> Result<bool> {
        // The no-entry-today condition lives in the filter, so the check
        // and the append are one store operation.
        let filter = doc! {
            "_id": id,
            "ownerEmail": owner_email,
            "completionHistory": {
                "$not": { "$elemMatch": { "$gte": day_start, "$lt": day_end } }
            }
        };

        let result = self
            .collection
            .update_one(filter, doc! { "$push": { "completionHistory": at } })
            .await?;

        Ok(result.modified_count > 0)
    }
}

/// Escape a user-supplied search string for use inside `$regex`, so it
/// behaves as a literal substring match.
fn escape_regex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(
            c,
            '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
