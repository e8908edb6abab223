//! Typed client for the booking backend.
//!
//! Every screen of the original client re-implemented these calls inline;
//! they are consolidated here as one method per documented endpoint, sharing
//! a single connection pool and the configured request timeout.

mod types;

pub use types::{
    DateCheckRequest, DateCheckResponse, DateTaskStatusResponse, LoginResponse, MarkReadRequest,
    NotificationRecord, Platform, TaskState, TaskStatusResponse,
};

use crate::config::ApiConfig;
use crate::domain::{Availability, SelectedCentre, TestCentre};
use crate::store::UserProfile;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use types::{
    ErrorBody, GetUserRequest, UpdateAvailabilityRequest, UpdateCentresRequest,
    UpdatePremiumRequest, UpdatePremiumResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {message}")]
    Rejected {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("no user record for that licence number")]
    UserNotFound,
}

/// Client over the backend's REST endpoints.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Kick off a login/scrape task for the stored profile.
    pub async fn login(&self, profile: &UserProfile) -> Result<LoginResponse, ApiError> {
        self.post_json("login", "/login", profile).await
    }

    /// Poll a login task.
    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, ApiError> {
        self.get_json("task-status", &format!("/task-status/{task_id}"))
            .await
    }

    /// Fetch the server's copy of the user record.
    pub async fn get_user(&self, license_number: &str) -> Result<UserProfile, ApiError> {
        let endpoint = "getUser";
        let response = self
            .http
            .post(self.url("/api/getUser"))
            .json(&GetUserRequest { license_number })
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::UserNotFound);
        }
        decode(endpoint, response).await
    }

    /// Create or overwrite the server-side user record from the local blob.
    pub async fn update_user_with_details(&self, profile: &UserProfile) -> Result<(), ApiError> {
        self.post_no_body_response("updateUserWithDetails", "/api/updateUserWithDetails", profile)
            .await
    }

    /// List every test centre with its currently published openings.
    pub async fn test_centres(&self) -> Result<Vec<TestCentre>, ApiError> {
        self.get_json("testCentres", "/api/testCentres").await
    }

    pub async fn update_centres(
        &self,
        license_number: &str,
        selected_centres: &[SelectedCentre],
    ) -> Result<(), ApiError> {
        self.post_no_body_response(
            "updateUserCentres",
            "/api/updateUserCentres",
            &UpdateCentresRequest {
                license_number,
                selected_centres,
            },
        )
        .await
    }

    /// First-time availability submission during onboarding.
    pub async fn update_availability(
        &self,
        license_number: &str,
        availability: &Availability,
    ) -> Result<(), ApiError> {
        self.post_no_body_response(
            "updateAvailability",
            "/api/updateAvailability",
            &UpdateAvailabilityRequest {
                license_number,
                availability,
            },
        )
        .await
    }

    /// Replace the availability preferences of an existing user.
    pub async fn update_user_availability(
        &self,
        license_number: &str,
        availability: &Availability,
    ) -> Result<(), ApiError> {
        self.post_no_body_response(
            "updateUserAvailability",
            "/api/updateUserAvailability",
            &UpdateAvailabilityRequest {
                license_number,
                availability,
            },
        )
        .await
    }

    /// Submit an availability-check job for the user's dates and centres.
    pub async fn start_date_check(
        &self,
        request: &DateCheckRequest,
    ) -> Result<DateCheckResponse, ApiError> {
        self.post_json("date", "/date", request).await
    }

    /// Poll a running availability-check job.
    pub async fn date_task_status(
        &self,
        task_id: &str,
    ) -> Result<DateTaskStatusResponse, ApiError> {
        self.get_json("taskDate-status", &format!("/taskDate-status/{task_id}"))
            .await
    }

    pub async fn notifications(&self, user_id: &str) -> Result<Vec<NotificationRecord>, ApiError> {
        self.get_json("notifications", &format!("/api/notifications/{user_id}"))
            .await
    }

    /// Only the notifications created since the last delivery sweep.
    pub async fn new_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<NotificationRecord>, ApiError> {
        self.get_json("notifications/new", &format!("/api/notifications/new/{user_id}"))
            .await
    }

    pub async fn mark_notifications_read(
        &self,
        user_id: &str,
        notification_ids: &[String],
    ) -> Result<(), ApiError> {
        self.post_no_body_response(
            "notifications/update",
            "/api/notifications/update",
            &MarkReadRequest {
                user_id,
                notification_ids,
            },
        )
        .await
    }

    /// Ask the backend to validate a store receipt.
    pub async fn verify_payment(
        &self,
        receipt: &str,
        platform: Platform,
    ) -> Result<bool, ApiError> {
        let response: VerifyPaymentResponse = self
            .post_json(
                "verifyPayment",
                "/api/verifyPayment",
                &VerifyPaymentRequest { receipt, platform },
            )
            .await?;
        Ok(response.is_valid)
    }

    /// Flip the premium flag; returns the server's updated user record.
    pub async fn update_premium_status(
        &self,
        license_number: &str,
        is_premium: bool,
    ) -> Result<UserProfile, ApiError> {
        let response: UpdatePremiumResponse = self
            .post_json(
                "updateUserPremiumStatus",
                "/api/updateUserPremiumStatus",
                &UpdatePremiumRequest {
                    license_number,
                    is_premium,
                },
            )
            .await?;
        Ok(response.user)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "GET {path}");
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        decode(endpoint, response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "POST {path}");
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        decode(endpoint, response).await
    }

    /// POST where only the status code matters; the body is discarded.
    async fn post_no_body_response<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), ApiError> {
        debug!(endpoint, "POST {path}");
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        check_status(endpoint, response).await.map(|_| ())
    }
}

async fn check_status(endpoint: &'static str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // The backend attaches {"message": ...} to most failures; fall back to
    // the raw body when it does not.
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(raw);
    Err(ApiError::Rejected {
        endpoint,
        status,
        message,
    })
}

async fn decode<T: DeserializeOwned>(
    endpoint: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    let response = check_status(endpoint, response).await?;
    response
        .json()
        .await
        .map_err(|source| ApiError::Decode { endpoint, source })
}
