//! Password gate for configuration changes.
//!
//! Passwords and security answers are stored as lowercase hex SHA-256.
//! Answers are trimmed and lowercased before hashing so recovery is not
//! case sensitive.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{AuthError, Result};
use crate::store::{self, UsageStore, PASSWORD_HASH, SECURITY_ANSWER_HASH, SECURITY_QUESTION};

pub const MIN_PASSWORD_LEN: usize = 4;

/// Security questions offered during setup, as `(id, prompt)`.
pub const SECURITY_QUESTIONS: &[(&str, &str)] = &[
    ("pet", "What is your first pet's name?"),
    ("city", "What city were you born in?"),
    ("school", "What is your mother's maiden name?"),
    ("car", "What was your first car?"),
    ("teacher", "What is your favorite teacher's name?"),
];

pub fn question_prompt(id: &str) -> Option<&'static str> {
    SECURITY_QUESTIONS
        .iter()
        .find(|(qid, _)| *qid == id)
        .map(|(_, prompt)| *prompt)
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn hash_answer(answer: &str) -> String {
    hash_secret(&answer.trim().to_lowercase())
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// First-time setup: password plus a security question for recovery.
pub async fn set_password(
    store: &dyn UsageStore,
    password: &str,
    confirm: &str,
    question: &str,
    answer: &str,
) -> Result<()> {
    check_new_password(password, confirm)?;
    if question.is_empty() {
        return Err(AuthError::MissingQuestion.into());
    }
    if question_prompt(question).is_none() {
        return Err(AuthError::UnknownQuestion(question.to_string()).into());
    }
    if answer.trim().is_empty() {
        return Err(AuthError::MissingAnswer.into());
    }

    let mut values = Map::new();
    values.insert(PASSWORD_HASH.into(), Value::String(hash_secret(password)));
    values.insert(SECURITY_QUESTION.into(), Value::String(question.to_string()));
    values.insert(SECURITY_ANSWER_HASH.into(), Value::String(hash_answer(answer)));
    store.set(values).await?;
    info!("password configured");
    Ok(())
}

pub async fn has_password(store: &dyn UsageStore) -> Result<bool> {
    Ok(store::load_string(store, PASSWORD_HASH).await?.is_some())
}

pub(crate) async fn require_password_set(store: &dyn UsageStore) -> Result<()> {
    if has_password(store).await? {
        Ok(())
    } else {
        Err(AuthError::NoPassword.into())
    }
}

pub async fn verify_password(store: &dyn UsageStore, password: &str) -> Result<()> {
    let stored = store::load_string(store, PASSWORD_HASH)
        .await?
        .ok_or(AuthError::NoPassword)?;
    let password = password.trim();
    if password.is_empty() {
        return Err(AuthError::EmptyPassword.into());
    }
    if hash_secret(password) != stored {
        return Err(AuthError::IncorrectPassword.into());
    }
    Ok(())
}

/// The configured security question id, if any.
pub async fn security_question(store: &dyn UsageStore) -> Result<Option<String>> {
    store::load_string(store, SECURITY_QUESTION).await
}

/// Replace the password after answering the security question.
///
/// Fails with [`AuthError::NoSecurityQuestion`] when recovery is impossible,
/// in which case the only way forward is [`reset_all`].
pub async fn recover_password(
    store: &dyn UsageStore,
    answer: &str,
    password: &str,
    confirm: &str,
) -> Result<()> {
    if security_question(store).await?.is_none() {
        return Err(AuthError::NoSecurityQuestion.into());
    }
    if answer.trim().is_empty() {
        return Err(AuthError::MissingAnswer.into());
    }
    check_new_password(password, confirm)?;

    let stored = store::load_string(store, SECURITY_ANSWER_HASH).await?;
    if stored.as_deref() != Some(hash_answer(answer).as_str()) {
        return Err(AuthError::IncorrectAnswer.into());
    }

    let mut values = Map::new();
    values.insert(PASSWORD_HASH.into(), Value::String(hash_secret(password)));
    store.set(values).await?;
    info!("password reset via security question");
    Ok(())
}

/// Wipe everything: rules, usage and credentials.
pub async fn reset_all(store: &dyn UsageStore) -> Result<()> {
    store.clear().await?;
    info!("all data cleared");
    Ok(())
}
