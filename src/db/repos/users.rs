use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateUser, User},
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, input: CreateUser) -> DbResult<User>;

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>>;

    /// Users whose `username` is absent.
    async fn list_missing_username(&self) -> DbResult<Vec<User>>;

    /// Set the username and stamp `updated_at`. Returns the number of rows updated.
    async fn set_username(&self, id: Uuid, username: &str, at: DateTime<Utc>) -> DbResult<u64>;
}
