//! Session identity: absent until established, cleared on sign-out.

use ingatini_client::RagService;
use ingatini_core::{Identity, UserId, ValidationError};

use crate::error::SessionError;

/// Holds the current user, if any.
#[derive(Debug, Clone)]
pub struct IdentityHolder {
    current: Option<Identity>,
    email_domain: String,
}

impl IdentityHolder {
    /// Create an absent holder. `email_domain` builds the account email.
    pub fn new(email_domain: impl Into<String>) -> Self {
        Self {
            current: None,
            email_domain: email_domain.into(),
        }
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.current.as_ref().map(|i| &i.id)
    }

    pub fn is_established(&self) -> bool {
        self.current.is_some()
    }

    /// Create or fetch the user named `display_name_input`.
    ///
    /// Any previous identity is dropped first, so a failure always leaves
    /// the holder absent.
    pub async fn establish(
        &mut self,
        service: &dyn RagService,
        display_name_input: &str,
    ) -> Result<&Identity, SessionError> {
        let username = display_name_input.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername.into());
        }

        self.current = None;
        let email = format!("{}@{}", username, self.email_domain);
        let identity = service.create_user(username, &email).await.map_err(|err| {
            tracing::warn!(username = %username, error = ?err, "Failed to establish identity");
            err
        })?;

        tracing::info!(user_id = %identity.id, username = %username, "Identity established");
        Ok(self.current.insert(identity))
    }

    /// Re-establish a known user by id.
    pub async fn resume(
        &mut self,
        service: &dyn RagService,
        user_id: &UserId,
    ) -> Result<&Identity, SessionError> {
        self.current = None;
        let identity = service.get_user(user_id).await.map_err(|err| {
            tracing::warn!(user_id = %user_id, error = ?err, "Failed to resume identity");
            err
        })?;

        tracing::info!(user_id = %identity.id, "Identity resumed");
        Ok(self.current.insert(identity))
    }

    /// Return to absent, handing back the identity that was held.
    pub fn clear(&mut self) -> Option<Identity> {
        self.current.take()
    }
}
