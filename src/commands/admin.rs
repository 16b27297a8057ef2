//! Admin command - Back-office account bootstrap.

use std::sync::Arc;

use crate::cli::args::{AdminAction, AdminArgs, StaffRole};
use crate::config::Config;
use crate::domain::UserRole;
use crate::errors::AppResult;
use crate::infra::{Database, Persistence};
use crate::services::{AuthService, Authenticator};

/// Execute the admin command
pub async fn execute(args: AdminArgs, config: Config) -> AppResult<()> {
    match args.action {
        AdminAction::Create {
            email,
            password,
            name,
            role,
        } => {
            let db = Database::connect(&config).await?;
            let auth = Authenticator::new(Arc::new(Persistence::new(db.get_connection())), config);

            let role = match role {
                StaffRole::Staff => UserRole::Staff,
                StaffRole::Admin => UserRole::Admin,
            };
            let user = auth.create_admin(email, password, name, role).await?;

            tracing::info!(user_id = %user.id, role = %role, "Back-office account created");
            println!("Created {} account {} ({})", role, user.email, user.id);
            Ok(())
        }
    }
}
