use crate::api::ApiError;
use crate::billing::BillingError;
use crate::config::ConfigError;
use crate::notifications::NotificationError;
use crate::poller::{PollError, RefreshError};
use crate::session::LoginError;
use crate::store::StoreError;
use crate::telemetry::TelemetryError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Api(ApiError),
    Store(StoreError),
    Poll(PollError),
    Refresh(RefreshError),
    Login(LoginError),
    Notification(NotificationError),
    Billing(BillingError),
    /// CLI input the clap layer cannot validate on its own.
    Usage(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Api(err) => write!(f, "api error: {}", err),
            AppError::Store(err) => write!(f, "storage error: {}", err),
            AppError::Poll(err) => write!(f, "availability check error: {}", err),
            AppError::Refresh(err) => write!(f, "refresh error: {}", err),
            AppError::Login(err) => write!(f, "login error: {}", err),
            AppError::Notification(err) => write!(f, "notification error: {}", err),
            AppError::Billing(err) => write!(f, "billing error: {}", err),
            AppError::Usage(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Api(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Poll(err) => Some(err),
            AppError::Refresh(err) => Some(err),
            AppError::Login(err) => Some(err),
            AppError::Notification(err) => Some(err),
            AppError::Billing(err) => Some(err),
            AppError::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<ApiError> for AppError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<PollError> for AppError {
    fn from(value: PollError) -> Self {
        Self::Poll(value)
    }
}

impl From<RefreshError> for AppError {
    fn from(value: RefreshError) -> Self {
        Self::Refresh(value)
    }
}

impl From<LoginError> for AppError {
    fn from(value: LoginError) -> Self {
        Self::Login(value)
    }
}

impl From<NotificationError> for AppError {
    fn from(value: NotificationError) -> Self {
        Self::Notification(value)
    }
}

impl From<BillingError> for AppError {
    fn from(value: BillingError) -> Self {
        Self::Billing(value)
    }
}
