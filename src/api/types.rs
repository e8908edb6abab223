//! Wire shapes for the booking backend. Field names follow the server's
//! camelCase JSON exactly; keep serde renames in sync with the endpoints.

use crate::domain::{SelectedCentre, SlotDate};
use crate::store::UserProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// States a server-side task moves through. Anything unrecognized is treated
/// as still running, matching how the clients poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Completed,
    Failed,
    #[serde(other)]
    Pending,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusResponse {
    pub status: TaskState,
    #[serde(default)]
    pub error: Option<String>,
}

/// Payload for `/date`, the availability-check job submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCheckRequest {
    pub license_number: String,
    pub application_ref: String,
    pub selected_dates: Vec<SlotDate>,
    pub selected_centres: Vec<SelectedCentre>,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateCheckResponse {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DateTaskStatusResponse {
    pub status: TaskState,
    /// Per-date matched time slots, present once the job completes.
    #[serde(default)]
    pub results: Option<BTreeMap<SlotDate, Vec<String>>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserRequest<'a> {
    pub license_number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCentresRequest<'a> {
    pub license_number: &'a str,
    pub selected_centres: &'a [SelectedCentre],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityRequest<'a> {
    pub license_number: &'a str,
    pub availability: &'a crate::domain::Availability,
}

/// Server-side notification record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub text: String,
    /// Creation timestamp as the server formats it.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_app: bool,
    #[serde(default)]
    pub selected_centre: Option<SelectedCentre>,
    /// Long-form date the notification refers to, e.g. `Monday 3 March 2025`.
    #[serde(default)]
    pub selected_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest<'a> {
    pub user_id: &'a str,
    pub notification_ids: &'a [String],
}

/// Store platform the purchase receipt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            other => Err(format!("unknown platform '{other}' (expected ios or android)")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentRequest<'a> {
    pub receipt: &'a str,
    pub platform: Platform,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub is_valid: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePremiumRequest<'a> {
    pub license_number: &'a str,
    pub is_premium: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePremiumResponse {
    pub user: UserProfile,
}

/// Error body the backend attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_states_read_as_pending() {
        let status: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"queued"}"#).expect("parses");
        assert_eq!(status.status, TaskState::Pending);
    }

    #[test]
    fn date_task_results_key_on_short_dates() {
        let body = r#"{"status":"completed","results":{"03/03/25":["08:10"],"04/03/25":[]}}"#;
        let status: DateTaskStatusResponse = serde_json::from_str(body).expect("parses");
        let results = status.results.expect("results present");
        let date = SlotDate::parse_short("03/03/25").expect("valid date");
        assert_eq!(results[&date], vec!["08:10".to_string()]);
    }

    #[test]
    fn platform_serializes_lowercase() {
        let body = serde_json::to_string(&VerifyPaymentRequest {
            receipt: "r1",
            platform: Platform::Ios,
        })
        .expect("serializes");
        assert!(body.contains(r#""platform":"ios""#));
    }
}
