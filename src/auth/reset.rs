//! Password-reset token lifecycle
//!
//! Tokens are 32 random bytes, hex encoded, handed to the user once (by
//! e-mail). Only the SHA-256 digest is persisted, on the user record, so a new
//! token overwrites the previous one and a successful reset clears it.

use super::password::PasswordHasher;
use crate::{
    clock::Clock, error::AppError, repository::CredentialStore, services::mailer::EmailSender,
};
use chrono::Duration;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const TOKEN_BYTES: usize = 32;

pub struct ResetTokenManager {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    hasher: Arc<PasswordHasher>,
    ttl: Duration,
    link_base: String,
}

impl ResetTokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        hasher: Arc<PasswordHasher>,
        ttl: Duration,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            hasher,
            ttl,
            link_base: link_base.into(),
        }
    }

    /// Issue a fresh token for `email`, persist its digest and mail the link.
    /// Any earlier token for the same user stops working.
    pub async fn generate(&self, email: &str) -> Result<String, AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found("user with this email not found"))?;

        let token = new_token();
        let expires_at = self.clock.now() + self.ttl;

        self.store
            .save_reset_token(user.id, &digest(&token), expires_at)
            .await?;

        let link = format!("{}{}", self.link_base, token);
        self.mailer
            .send_reset_link(&user.email, &link)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to send reset email");
                AppError::internal_error("failed to send reset email")
            })?;

        tracing::info!(user_id = %user.id, expires_at = %expires_at, "Password reset token issued");
        Ok(token)
    }

    /// Redeem `token`: set the new password and burn the token.
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_reset_token(&digest(token))
            .await?
            .ok_or(AppError::InvalidResetToken)?;

        match user.reset_expires_at {
            Some(expires_at) if self.clock.now() < expires_at => {}
            _ => {
                tracing::info!(user_id = %user.id, "Expired reset token presented");
                return Err(AppError::ExpiredResetToken);
            }
        }

        let password_hash = self.hasher.hash(new_password)?;
        if !self
            .store
            .update_password_hash(user.id, &password_hash)
            .await?
        {
            return Err(AppError::InvalidResetToken);
        }

        // The password is already changed at this point; the caller must not
        // treat the token as still usable.
        self.store.clear_reset_token(user.id).await.map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "Reset token clear failed after password update");
            AppError::internal_error(
                "password was updated but the reset token could not be cleared",
            )
        })?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 of a reset token, the form stored at rest
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
