//! Premium upgrades: receipt verification and the premium-flag flip.

use crate::api::{ApiClient, ApiError, Platform};
use crate::store::{ProfileStore, StoreError, UserProfile};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no profile stored; log in first")]
    MissingProfile,
    #[error("stored profile has no licence number; log in first")]
    MissingLicence,
    #[error("the backend rejected the purchase receipt")]
    InvalidReceipt,
    #[error("the backend did not record the premium upgrade")]
    NotApplied,
}

pub struct BillingService<S> {
    api: Arc<ApiClient>,
    store: Arc<S>,
}

impl<S: ProfileStore> BillingService<S> {
    pub fn new(api: Arc<ApiClient>, store: Arc<S>) -> Self {
        Self { api, store }
    }

    /// Verify a store receipt and, when valid, record the premium upgrade.
    /// The server's returned user record replaces the local blob so the flag
    /// and anything else that changed land together.
    pub async fn redeem(
        &self,
        receipt: &str,
        platform: Platform,
    ) -> Result<UserProfile, BillingError> {
        let profile = self.store.load()?.ok_or(BillingError::MissingProfile)?;
        let licence = profile.license_number.ok_or(BillingError::MissingLicence)?;

        if !self.api.verify_payment(receipt, platform).await? {
            return Err(BillingError::InvalidReceipt);
        }

        let user = self.api.update_premium_status(&licence, true).await?;
        if !user.is_premium {
            return Err(BillingError::NotApplied);
        }

        self.store.save(&user)?;
        info!("premium upgrade recorded");
        Ok(user)
    }
}
