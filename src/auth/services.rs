use thiserror::Error;
use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::User;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already registered")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    Unauthenticated,
    #[error("Store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    username: &str,
    email: &str,
    password: &str,
) -> Result<(String, User), AuthError> {
    // Username first, then email, each checked on its own.
    if users
        .find_by_username(username)
        .await
        .map_err(AuthError::StoreUnavailable)?
        .is_some()
    {
        warn!(%username, "username already registered");
        return Err(AuthError::UsernameTaken);
    }
    if users
        .find_by_email(email)
        .await
        .map_err(AuthError::StoreUnavailable)?
        .is_some()
    {
        warn!(%email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(password).map_err(AuthError::Internal)?;
    let user = users
        .insert(username, email, &hash)
        .await
        .map_err(AuthError::StoreUnavailable)?;

    let token = keys.sign(&user.username).map_err(AuthError::Internal)?;
    info!(user_id = %user.id, %username, "user registered");
    Ok((token, user))
}

/// Unknown username and wrong password are deliberately collapsed into
/// one `InvalidCredentials` answer.
pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    username: &str,
    password: &str,
) -> Result<(String, User), AuthError> {
    let user = match users
        .find_by_username(username)
        .await
        .map_err(AuthError::StoreUnavailable)?
    {
        Some(u) => u,
        None => {
            warn!(%username, "login for unknown username");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash) {
        warn!(user_id = %user.id, %username, "login with invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = keys.sign(&user.username).map_err(AuthError::Internal)?;
    info!(user_id = %user.id, %username, "user logged in");
    Ok((token, user))
}

/// A valid signature alone is not proof of identity: the embedded
/// subject must still resolve to a live user.
pub async fn resolve_current_user(
    users: &dyn UserStore,
    keys: &JwtKeys,
    token: &str,
) -> Result<User, AuthError> {
    let claims = keys.verify(token).map_err(|_| AuthError::Unauthenticated)?;
    users
        .find_by_username(&claims.sub)
        .await
        .map_err(AuthError::StoreUnavailable)?
        .ok_or(AuthError::Unauthenticated)
}
