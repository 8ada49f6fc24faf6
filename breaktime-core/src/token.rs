//! Credential validation and refresh at batch boundaries.

use std::sync::Arc;

use tracing::{info, warn};

use crate::control_plane::CredentialValidator;
use crate::credential::{Credential, IdentityProvider};
use crate::error::{AuthError, JobError};

/// How many times a rejected credential is replaced before giving up.
pub const MAX_REFRESH_ATTEMPTS: usize = 5;

/// Keeps the run supplied with a credential the remote side accepts.
///
/// Only the controlling task calls into the manager; worker tasks receive
/// the resulting credential by value and never refresh it themselves.
#[derive(Clone)]
pub struct TokenLifecycleManager {
    validator: Arc<dyn CredentialValidator>,
    provider: Arc<dyn IdentityProvider>,
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("max_refresh_attempts", &MAX_REFRESH_ATTEMPTS)
            .finish_non_exhaustive()
    }
}

impl TokenLifecycleManager {
    pub fn new(
        validator: Arc<dyn CredentialValidator>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            validator,
            provider,
        }
    }

    /// Mint the first credential of a run.
    pub async fn acquire(&self) -> Result<Credential, AuthError> {
        info!("Fetching identity token");
        self.provider.fetch_token().await.map_err(AuthError::Provider)
    }

    /// Return a credential that passed validation, replacing `credential`
    /// when it is rejected.
    ///
    /// A 403 triggers a refresh and another validation, up to
    /// [`MAX_REFRESH_ATTEMPTS`] refreshes. Any other validation failure is
    /// returned immediately.
    pub async fn ensure_valid(
        &self,
        credential: Credential,
    ) -> Result<Credential, AuthError> {
        let mut current = credential;
        let mut refreshes = 0;

        loop {
            match self.validator.validate(&current).await {
                Ok(()) => return Ok(current),
                Err(JobError::Forbidden)
                    if refreshes < MAX_REFRESH_ATTEMPTS =>
                {
                    refreshes += 1;
                    info!(
                        "Updating identity token...({}/{})",
                        refreshes, MAX_REFRESH_ATTEMPTS
                    );
                    current = self
                        .provider
                        .fetch_token()
                        .await
                        .map_err(AuthError::Provider)?;
                }
                Err(JobError::Forbidden) => {
                    warn!(
                        "Failed to update identity token after {} attempts",
                        refreshes
                    );
                    return Err(AuthError::CredentialExhausted {
                        attempts: refreshes,
                    });
                }
                Err(other) => return Err(AuthError::Validation(other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::MockCredentialValidator;
    use crate::credential::MockIdentityProvider;

    fn manager(
        validator: MockCredentialValidator,
        provider: MockIdentityProvider,
    ) -> TokenLifecycleManager {
        TokenLifecycleManager::new(Arc::new(validator), Arc::new(provider))
    }

    #[tokio::test]
    async fn valid_credential_is_returned_untouched() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(1).returning(|_| Ok(()));
        let mut provider = MockIdentityProvider::new();
        provider.expect_fetch_token().never();

        let token = manager(validator, provider)
            .ensure_valid(Credential::new("current"))
            .await
            .unwrap();
        assert_eq!(token.secret(), "current");
    }

    #[tokio::test]
    async fn rejected_credential_is_replaced() {
        let mut validator = MockCredentialValidator::new();
        validator
            .expect_validate()
            .returning(|credential| match credential.secret() {
                "fresh" => Ok(()),
                _ => Err(JobError::Forbidden),
            });
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_fetch_token()
            .times(1)
            .returning(|| Ok(Credential::new("fresh")));

        let token = manager(validator, provider)
            .ensure_valid(Credential::new("stale"))
            .await
            .unwrap();
        assert_eq!(token.secret(), "fresh");
    }

    #[tokio::test]
    async fn sixth_rejection_exhausts_the_budget() {
        let mut validator = MockCredentialValidator::new();
        validator
            .expect_validate()
            .times(MAX_REFRESH_ATTEMPTS + 1)
            .returning(|_| Err(JobError::Forbidden));
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_fetch_token()
            .times(MAX_REFRESH_ATTEMPTS)
            .returning(|| Ok(Credential::new("still-bad")));

        let result = manager(validator, provider)
            .ensure_valid(Credential::new("stale"))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::CredentialExhausted { attempts: 5 })
        ));
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let mut validator = MockCredentialValidator::new();
        validator.expect_validate().times(1).returning(|_| {
            Err(JobError::Remote {
                status: 500,
                body: "boom".into(),
            })
        });
        let mut provider = MockIdentityProvider::new();
        provider.expect_fetch_token().never();

        let result = manager(validator, provider)
            .ensure_valid(Credential::new("current"))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::Validation(JobError::Remote { status: 500, .. }))
        ));
    }

    #[tokio::test]
    async fn provider_failure_stops_the_refresh() {
        let mut validator = MockCredentialValidator::new();
        validator
            .expect_validate()
            .times(1)
            .returning(|_| Err(JobError::Forbidden));
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_fetch_token()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("gcloud not installed")));

        let result = manager(validator, provider)
            .ensure_valid(Credential::new("stale"))
            .await;
        assert!(matches!(result, Err(AuthError::Provider(_))));
    }
}
