//! Refresh session storage.
//!
//! A row exists for every refresh token that may still be redeemed. Rotation
//! deletes the row it redeems, so a missing row means the token was already
//! used or revoked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::entities::refresh_session::{self, ActiveModel, Entity as SessionEntity};
use crate::domain::RefreshSession;
use crate::errors::AppResult;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: RefreshSession) -> AppResult<()>;

    /// Delete session `id` of `user_id`. True only for the caller that
    /// actually removed the row.
    async fn consume(&self, id: Uuid, user_id: Uuid) -> AppResult<bool>;

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64>;

    /// Keep the `keep` newest sessions of `user_id`, delete the rest.
    async fn prune_oldest(&self, user_id: Uuid, keep: u64) -> AppResult<u64>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

pub struct SessionStore {
    db: DatabaseConnection,
}

impl SessionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionRepository for SessionStore {
    async fn create(&self, session: RefreshSession) -> AppResult<()> {
        ActiveModel {
            id: Set(session.id),
            user_id: Set(session.user_id),
            expires_at: Set(session.expires_at),
            created_at: Set(session.created_at),
            user_agent: Set(session.user_agent),
            ip: Set(session.ip),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn consume(&self, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = SessionEntity::delete_many()
            .filter(refresh_session::Column::Id.eq(id))
            .filter(refresh_session::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<u64> {
        let result = SessionEntity::delete_many()
            .filter(refresh_session::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn prune_oldest(&self, user_id: Uuid, keep: u64) -> AppResult<u64> {
        let stale: Vec<Uuid> = SessionEntity::find()
            .select_only()
            .column(refresh_session::Column::Id)
            .filter(refresh_session::Column::UserId.eq(user_id))
            .order_by_desc(refresh_session::Column::CreatedAt)
            .order_by_desc(refresh_session::Column::Id)
            .offset(keep)
            .into_tuple()
            .all(&self.db)
            .await?;

        if stale.is_empty() {
            return Ok(0);
        }

        let result = SessionEntity::delete_many()
            .filter(refresh_session::Column::Id.is_in(stale))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = SessionEntity::delete_many()
            .filter(refresh_session::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
