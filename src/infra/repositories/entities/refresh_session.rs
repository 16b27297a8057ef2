//! Refresh session entity.

use sea_orm::entity::prelude::*;

use crate::domain::RefreshSession;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "refresh_sessions")]
pub struct Model {
    /// `jti` of the refresh token
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for RefreshSession {
    fn from(model: Model) -> Self {
        RefreshSession {
            id: model.id,
            user_id: model.user_id,
            expires_at: model.expires_at,
            created_at: model.created_at,
            user_agent: model.user_agent,
            ip: model.ip,
        }
    }
}
