//! User store seam
//!
//! Registration is one conditional upsert keyed on the subject identifier,
//! so two concurrent sign-up reports for the same account cannot create
//! duplicate records.

use async_trait::async_trait;
use bson::doc;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::types::{HabitError, Result};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist the user unless a record with the same subject already
    /// exists. Returns whether a new record was created.
    async fn upsert(&self, user: UserDoc) -> Result<bool>;

    /// Fetch one user by subject identifier
    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<UserDoc>>;
}

/// MongoDB-backed user store
#[derive(Clone)]
pub struct MongoUserStore {
    collection: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    /// Open the users collection (applies schema indexes)
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<UserDoc>(USER_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn upsert(&self, user: UserDoc) -> Result<bool> {
        let fields = bson::to_document(&user)
            .map_err(|e| HabitError::Database(format!("Failed to encode user: {}", e)))?;

        // $setOnInsert keyed on the subject makes the exists-check and the
        // insert one store operation.
        let result = self
            .collection
            .upsert_one(
                doc! { "subjectId": &user.subject_id },
                doc! { "$setOnInsert": fields },
            )
            .await?;

        Ok(result.upserted_id.is_some())
    }

    async fn find_by_subject(&self, subject_id: &str) -> Result<Option<UserDoc>> {
        self.collection
            .find_one(doc! { "subjectId": subject_id })
            .await
    }
}
