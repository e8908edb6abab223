//! Login workflow: submit credentials, wait out the server-side task, and
//! persist the resulting user record into the profile blob.

use crate::api::{ApiClient, ApiError, TaskState};
use crate::config::PollConfig;
use crate::domain::credentials::{
    normalize_licence_number, validate_application_ref, validate_licence_number, CredentialError,
};
use crate::store::{ProfileStore, StoreError, UserProfile};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid credentials: {0}")]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("the server refused to start a login task")]
    Rejected,
    #[error("login failed: {0}")]
    TaskFailed(String),
    #[error("login task did not finish within {attempts} status checks")]
    TimedOut { attempts: u32 },
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub profile: UserProfile,
    pub premium: bool,
    /// True when the server had no record and one was created from the blob.
    pub created: bool,
}

pub struct LoginFlow<S> {
    api: Arc<ApiClient>,
    store: Arc<S>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl<S: ProfileStore> LoginFlow<S> {
    pub fn new(api: Arc<ApiClient>, store: Arc<S>, config: &PollConfig) -> Self {
        Self {
            api,
            store,
            poll_interval: config.login_poll_interval,
            max_attempts: config.login_max_attempts,
        }
    }

    /// Run the whole flow. Credentials are validated and merged into the
    /// stored blob before the server sees them, so a crash mid-login leaves
    /// the identifiers cached for the next attempt.
    pub async fn login(&self, licence: &str, application_ref: &str) -> Result<LoginOutcome, LoginError> {
        let licence = normalize_licence_number(licence);
        validate_licence_number(&licence)?;
        let application_ref = application_ref.trim();
        validate_application_ref(application_ref)?;

        let profile = self.merge_credentials(&licence, application_ref)?;

        let response = self.api.login(&profile).await?;
        if !response.success {
            return Err(LoginError::Rejected);
        }
        let task_id = response.task_id.ok_or(LoginError::Rejected)?;
        info!(%task_id, "login task started");

        self.await_task(&task_id).await?;
        self.adopt_server_record(&profile, &licence).await
    }

    /// Merge credentials into the blob. A corrupt blob is discarded rather
    /// than blocking login; onboarding data it held is re-entered later.
    fn merge_credentials(
        &self,
        licence: &str,
        application_ref: &str,
    ) -> Result<UserProfile, StoreError> {
        let mut profile = match self.store.load() {
            Ok(profile) => profile.unwrap_or_default(),
            Err(StoreError::Corrupt { path, source }) => {
                warn!(path = %path.display(), error = %source, "profile blob unreadable; starting fresh");
                UserProfile::default()
            }
            Err(err) => return Err(err),
        };
        profile.license_number = Some(licence.to_string());
        profile.application_ref = Some(application_ref.to_string());
        self.store.save(&profile)?;
        Ok(profile)
    }

    async fn await_task(&self, task_id: &str) -> Result<(), LoginError> {
        for _ in 0..self.max_attempts {
            let status = self.api.task_status(task_id).await?;
            match status.status {
                TaskState::Completed => return Ok(()),
                TaskState::Failed => {
                    let message = status
                        .error
                        .unwrap_or_else(|| "login failed, please try again".to_string());
                    return Err(LoginError::TaskFailed(message));
                }
                TaskState::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
        Err(LoginError::TimedOut {
            attempts: self.max_attempts,
        })
    }

    /// Fetch the server's record, creating it from the blob when unknown,
    /// and make it the new local truth.
    async fn adopt_server_record(
        &self,
        submitted: &UserProfile,
        licence: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let (user, created) = match self.api.get_user(licence).await {
            Ok(user) => (user, false),
            Err(ApiError::UserNotFound) => {
                info!("no server record for this licence; creating one");
                self.api.update_user_with_details(submitted).await?;
                (self.api.get_user(licence).await?, true)
            }
            Err(err) => return Err(err.into()),
        };

        let premium = user.is_premium;
        self.store.save(&user)?;
        info!(premium, "login complete");
        Ok(LoginOutcome {
            profile: user,
            premium,
            created,
        })
    }
}
