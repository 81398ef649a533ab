//! Account registration, login and profile edits.
//!
//! Session handling lives in the web layer; these functions only decide
//! who the user is.

mod password;

use serde::Deserialize;
use tracing::info;

use crate::db::{Database, User, UserUpdate};
use crate::error::AppError;

pub use password::PasswordHasher;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Profile edit; blank fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub fn register(db: &Database, hasher: &PasswordHasher, form: &RegisterForm) -> Result<User, AppError> {
    let username = form.username.trim();
    if username.is_empty() {
        return Err(AppError::MissingField("username"));
    }
    if form.password.is_empty() {
        return Err(AppError::MissingField("password"));
    }
    if db.find_user_by_username(username)?.is_some() {
        return Err(AppError::DuplicateUser);
    }

    let password_hash = hasher.hash(&form.password);
    // The unique index still guards against a concurrent registration
    let user = db
        .create_user(username, form.email.trim(), &password_hash)?
        .ok_or(AppError::DuplicateUser)?;

    info!(user_id = user.id, "Registered user {}", user.username);
    Ok(user)
}

/// Unknown usernames and wrong passwords fail the same way and take the
/// same hashing work.
pub fn login(db: &Database, hasher: &PasswordHasher, form: &LoginForm) -> Result<User, AppError> {
    let Some(user) = db.find_user_by_username(form.username.trim())? else {
        hasher.reject(&form.password);
        return Err(AppError::InvalidCredentials);
    };

    if !PasswordHasher::verify(&user.password_hash, &form.password) {
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

pub fn edit_profile(
    db: &Database,
    hasher: &PasswordHasher,
    user: &User,
    form: &ProfileForm,
) -> Result<User, AppError> {
    let update = UserUpdate {
        username: provided(&form.username)
            .filter(|name| *name != user.username)
            .map(str::to_string),
        email: provided(&form.email).map(str::to_string),
        password_hash: form
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| hasher.hash(p)),
    };

    if update.is_empty() {
        return Ok(user.clone());
    }

    let updated = db
        .update_user(user.id, &update)?
        .ok_or(AppError::DuplicateUser)?;

    info!(user_id = user.id, "Updated profile for {}", updated.username);
    Ok(updated)
}

fn provided(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
