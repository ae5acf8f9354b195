// Error taxonomy for the membership core.
//
// Every failure the core reports carries an `ErrorCode`. Each code belongs to
// exactly one `ErrorCategory`, which is what callers branch on when they do not
// care about the precise constraint that failed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Unauthorized,
    NotFound,
    Conflict,
    QuotaExceeded,
    Expired,
    TierMismatch,
    UpstreamGatewayFailure,
    ValidationFailure,
    Internal,
}

/// All error codes the core can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authorization
    Unauthorized,
    RoleNotPermitted,
    UnauthorizedSpace,
    NoActiveSubscription,
    WebhookSignatureInvalid,

    // Lookups
    PlanNotFound,
    CodeNotFound,
    PrincipalNotFound,
    SpaceNotFound,
    TeamNotFound,
    InvitationNotFound,
    SubscriptionNotFound,

    // Conflicts
    DuplicatePayment,
    PrincipalAlreadyExists,
    SpaceNameTaken,
    PlanNameTaken,
    AlreadyTeamMember,
    InvitationAlreadyPending,

    // Entitlement
    QuotaExceeded,
    CodeExpired,
    SubscriptionExpired,
    TierMismatch,

    // Payment gateway
    GatewayError,
    PaymentNotSuccessful,
    PlanUnresolvable,

    // Input
    InvalidCode,
    InvalidReference,
    InvalidPlan,
    InvalidEmail,
    InvalidInput,
    CannotRemoveSelf,

    // Internal
    CodeSpaceExhausted,
    InternalProcessingError,
}

impl ErrorCode {
    /// The category this code is reported under.
    pub fn category(&self) -> ErrorCategory {
        use ErrorCategory as C;
        match self {
            Self::Unauthorized
            | Self::RoleNotPermitted
            | Self::UnauthorizedSpace
            | Self::NoActiveSubscription
            | Self::WebhookSignatureInvalid => C::Unauthorized,
            Self::PlanNotFound
            | Self::CodeNotFound
            | Self::PrincipalNotFound
            | Self::SpaceNotFound
            | Self::TeamNotFound
            | Self::InvitationNotFound
            | Self::SubscriptionNotFound => C::NotFound,
            Self::DuplicatePayment
            | Self::PrincipalAlreadyExists
            | Self::SpaceNameTaken
            | Self::PlanNameTaken
            | Self::AlreadyTeamMember
            | Self::InvitationAlreadyPending => C::Conflict,
            Self::QuotaExceeded => C::QuotaExceeded,
            Self::CodeExpired | Self::SubscriptionExpired => C::Expired,
            Self::TierMismatch => C::TierMismatch,
            Self::GatewayError => C::UpstreamGatewayFailure,
            Self::PaymentNotSuccessful
            | Self::PlanUnresolvable
            | Self::InvalidCode
            | Self::InvalidReference
            | Self::InvalidPlan
            | Self::InvalidEmail
            | Self::InvalidInput
            | Self::CannotRemoveSelf => C::ValidationFailure,
            Self::CodeSpaceExhausted | Self::InternalProcessingError => C::Internal,
        }
    }

    /// Default HTTP status for this code.
    pub fn http_status(&self) -> HttpStatus {
        match self {
            Self::Unauthorized | Self::WebhookSignatureInvalid => HttpStatus::Unauthorized,
            Self::RoleNotPermitted
            | Self::UnauthorizedSpace
            | Self::NoActiveSubscription
            | Self::QuotaExceeded
            | Self::SubscriptionExpired
            | Self::TierMismatch => HttpStatus::Forbidden,
            Self::PlanNotFound
            | Self::CodeNotFound
            | Self::PrincipalNotFound
            | Self::SpaceNotFound
            | Self::TeamNotFound
            | Self::InvitationNotFound
            | Self::SubscriptionNotFound => HttpStatus::NotFound,
            Self::DuplicatePayment
            | Self::PrincipalAlreadyExists
            | Self::SpaceNameTaken
            | Self::PlanNameTaken
            | Self::AlreadyTeamMember
            | Self::InvitationAlreadyPending => HttpStatus::Conflict,
            Self::CodeExpired => HttpStatus::Gone,
            Self::GatewayError => HttpStatus::BadGateway,
            Self::PaymentNotSuccessful
            | Self::PlanUnresolvable
            | Self::InvalidCode
            | Self::InvalidReference
            | Self::InvalidPlan
            | Self::InvalidEmail
            | Self::InvalidInput
            | Self::CannotRemoveSelf => HttpStatus::BadRequest,
            Self::CodeSpaceExhausted | Self::InternalProcessingError => {
                HttpStatus::InternalServerError
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Unauthorized => "Authentication required",
            Self::RoleNotPermitted => "This action is not available for your account type",
            Self::UnauthorizedSpace => "Unauthorized space",
            Self::NoActiveSubscription => "No active subscription found",
            Self::WebhookSignatureInvalid => "Webhook signature verification failed",
            Self::PlanNotFound => "Plan not found",
            Self::CodeNotFound => "Code not found",
            Self::PrincipalNotFound => "User not found",
            Self::SpaceNotFound => "Space not found",
            Self::TeamNotFound => "Team not found",
            Self::InvitationNotFound => "Invitation not found",
            Self::SubscriptionNotFound => "Subscription not found",
            Self::DuplicatePayment => "This payment has already been processed",
            Self::PrincipalAlreadyExists => "A user with this email already exists",
            Self::SpaceNameTaken => "A space with this name already exists",
            Self::PlanNameTaken => "A plan with this name already exists",
            Self::AlreadyTeamMember => "User is already a member of this team",
            Self::InvitationAlreadyPending => "A pending invitation for this email already exists",
            Self::QuotaExceeded => "Monthly plan limit reached",
            Self::CodeExpired => "Code has expired",
            Self::SubscriptionExpired => "Subscription has expired",
            Self::TierMismatch => "Your plan does not include access to this space",
            Self::GatewayError => "Payment gateway request failed",
            Self::PaymentNotSuccessful => "Payment verification failed",
            Self::PlanUnresolvable => "Could not identify plan for this transaction",
            Self::InvalidCode => "Access code must be 6 digits",
            Self::InvalidReference => "Payment reference is required",
            Self::InvalidPlan => "Invalid plan definition",
            Self::InvalidEmail => "Invalid email",
            Self::InvalidInput => "Invalid input",
            Self::CannotRemoveSelf => "You cannot remove yourself from the team",
            Self::CodeSpaceExhausted => "Could not allocate a free access code",
            Self::InternalProcessingError => "Internal processing error",
        };
        write!(f, "{msg}")
    }
}

/// HTTP status codes used by the API error system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    Conflict = 409,
    Gone = 410,
    UnprocessableEntity = 422,
    InternalServerError = 500,
    BadGateway = 502,
}

impl HttpStatus {
    pub fn status_code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// Caller-facing error: a status, a code, and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status} {code:?}: {message}")]
pub struct ApiError {
    pub status: HttpStatus,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: code.http_status(),
            message: code.to_string(),
            code,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.http_status(),
            code,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Build a JSON body for the error response.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "category": self.code.category(),
            "message": self.message,
        })
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum NomadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unique constraint violated on {model}.{field}")]
    UniqueViolation { model: String, field: String },

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl NomadError {
    /// Project any error onto the code reported to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Api(e) => e.code,
            Self::Gateway(_) => ErrorCode::GatewayError,
            Self::Config(_)
            | Self::Database(_)
            | Self::UniqueViolation { .. }
            | Self::Other(_)
            | Self::Anyhow(_) => ErrorCode::InternalProcessingError,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Convert into the caller-facing form. Internal details stay in the logs.
    pub fn to_api_error(&self) -> ApiError {
        match self {
            Self::Api(e) => e.clone(),
            Self::Gateway(detail) => ApiError::with_message(ErrorCode::GatewayError, detail.clone()),
            other => {
                tracing::error!(error = %other, "internal processing error");
                ApiError::new(ErrorCode::InternalProcessingError)
            }
        }
    }

    pub fn is_unique_violation(&self, on_model: &str, on_field: &str) -> bool {
        matches!(self, Self::UniqueViolation { model, field } if model == on_model && field == on_field)
    }
}

impl From<ErrorCode> for NomadError {
    fn from(code: ErrorCode) -> Self {
        Self::Api(ApiError::new(code))
    }
}

impl From<serde_json::Error> for NomadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Database(format!("record (de)serialization failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, NomadError>;
