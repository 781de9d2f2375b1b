//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! ADMIN_PASSWORD=... emporium admin create -e admin@example.com -n "Admin Name"
//! emporium admin create -e owner@example.com -n "Owner" --promote
//! ```

use emporium_core::{Email, UserId, UserRole};
use emporium_server::db::UserRepository;
use emporium_server::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Neither `--password` nor `ADMIN_PASSWORD` was given.
    #[error("A password is required: pass --password or set ADMIN_PASSWORD")]
    MissingPassword,

    #[error("User already exists with email: {0} (use --promote to make them an admin)")]
    UserExists(String),

    #[error("Database error: {0}")]
    Repository(#[from] emporium_server::db::RepositoryError),

    #[error("Could not create user: {0}")]
    Auth(#[from] AuthError),
}

/// Create an admin user, or promote an existing one when `promote` is set.
///
/// Returns the admin's user ID.
pub async fn create_user(
    email: &str,
    name: &str,
    password: Option<String>,
    promote: bool,
) -> Result<UserId, AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    if let Some(existing) = users.get_by_email(&parsed).await? {
        if !promote {
            return Err(AdminError::UserExists(email.to_owned()));
        }
        if existing.role == UserRole::Admin {
            tracing::info!(user_id = %existing.id, "User is already an admin");
            return Ok(existing.id);
        }
        let user = users.set_role(existing.id, UserRole::Admin).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
        return Ok(user.id);
    }

    let password = password
        .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
        .filter(|p| !p.is_empty())
        .ok_or(AdminError::MissingPassword)?;

    let user = AuthService::new(&pool)
        .create_user(email, name, &password, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );

    Ok(user.id)
}
