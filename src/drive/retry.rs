use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{DriveApi, DriveError, DriveItem, Grant, ItemPage, Permission};
use crate::role::Role;

/// Exponential backoff for transient Drive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// plus up to one `base` of random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        if self.jitter && !self.base_delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..1.0);
            backoff + self.base_delay.mul_f64(extra)
        } else {
            backoff
        }
    }

    /// Run `call` until it succeeds, fails permanently, or the retry budget is
    /// spent. The last error is returned in the latter two cases.
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, DriveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let wait = self.delay(attempt);
                    tracing::warn!(
                        status = ?err.status(),
                        "{} failed ({}), retrying in {:.1}s ({}/{})",
                        what,
                        err,
                        wait.as_secs_f64(),
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(
                            "giving up on {} after {} retries: {}",
                            what,
                            self.max_retries,
                            err
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

/// A [`DriveApi`] that retries every call of the inner client under a policy.
pub struct Retrying<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: DriveApi> Retrying<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: DriveApi> DriveApi for Retrying<D> {
    async fn get_item(&self, item_id: &str) -> Result<DriveItem, DriveError> {
        self.policy
            .run(&format!("files.get {}", item_id), || self.inner.get_item(item_id))
            .await
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemPage, DriveError> {
        self.policy
            .run(&format!("files.list {}", folder_id), || {
                self.inner.list_children(folder_id, page_token)
            })
            .await
    }

    async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>, DriveError> {
        self.policy
            .run(&format!("permissions.list {}", item_id), || {
                self.inner.list_permissions(item_id)
            })
            .await
    }

    async fn create_permission(
        &self,
        item_id: &str,
        grant: &Grant,
    ) -> Result<Permission, DriveError> {
        self.policy
            .run(&format!("permissions.create {}", item_id), || {
                self.inner.create_permission(item_id, grant)
            })
            .await
    }

    async fn update_permission(
        &self,
        item_id: &str,
        permission_id: &str,
        role: Role,
    ) -> Result<(), DriveError> {
        self.policy
            .run(&format!("permissions.update {}", item_id), || {
                self.inner.update_permission(item_id, permission_id, role)
            })
            .await
    }

    async fn delete_permission(
        &self,
        item_id: &str,
        permission_id: &str,
    ) -> Result<(), DriveError> {
        self.policy
            .run(&format!("permissions.delete {}", item_id), || {
                self.inner.delete_permission(item_id, permission_id)
            })
            .await
    }

    async fn set_download_restriction(
        &self,
        item_id: &str,
        restricted: bool,
    ) -> Result<(), DriveError> {
        self.policy
            .run(&format!("files.update {}", item_id), || {
                self.inner.set_download_restriction(item_id, restricted)
            })
            .await
    }

    async fn whoami(&self) -> Result<String, DriveError> {
        self.policy.run("about.get", || self.inner.whoami()).await
    }
}
