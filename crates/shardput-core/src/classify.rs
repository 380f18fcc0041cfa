//! Failure classification for submission attempts.
//!
//! Classification is a pure function of the reported error code, so the same
//! code always yields the same [`FailureClass`] within a process.
//!
//! Unknown codes are classified [`FailureClass::Transient`]. This is a policy
//! choice favoring availability: a new throttling code added by the service
//! should not silently drop telemetry, and the retry budget bounds the cost
//! of being wrong.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::submit::{ApiError, RecordOutcome, SubmitReply};

/// Code used for replies whose per-record outcomes cannot be matched to the
/// submitted records.
pub const MALFORMED_REPLY_CODE: &str = "MalformedReply";

/// Outcome class of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Success,
    Transient,
    Permanent,
}

impl FailureClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service error codes the batcher knows how to classify.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ResourceNotFound,
    InvalidArgument,
    AccessDenied,
    KmsDisabled,
    KmsNotFound,
    KmsAccessDenied,
    KmsInvalidState,
    ProvisionedThroughputExceeded,
    LimitExceeded,
    KmsThrottling,
    InternalFailure,
    ServiceUnavailable,
    Unknown(String),
}

impl ErrorCode {
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" => Self::ResourceNotFound,
            "InvalidArgumentException" => Self::InvalidArgument,
            "AccessDeniedException" => Self::AccessDenied,
            "KMSDisabledException" => Self::KmsDisabled,
            "KMSNotFoundException" => Self::KmsNotFound,
            "KMSAccessDeniedException" => Self::KmsAccessDenied,
            "KMSInvalidStateException" => Self::KmsInvalidState,
            "ProvisionedThroughputExceededException" => Self::ProvisionedThroughputExceeded,
            "LimitExceededException" => Self::LimitExceeded,
            "KMSThrottlingException" => Self::KmsThrottling,
            "InternalFailure" => Self::InternalFailure,
            "ServiceUnavailable" => Self::ServiceUnavailable,
            other => Self::Unknown(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::InvalidArgument => "InvalidArgumentException",
            Self::AccessDenied => "AccessDeniedException",
            Self::KmsDisabled => "KMSDisabledException",
            Self::KmsNotFound => "KMSNotFoundException",
            Self::KmsAccessDenied => "KMSAccessDeniedException",
            Self::KmsInvalidState => "KMSInvalidStateException",
            Self::ProvisionedThroughputExceeded => "ProvisionedThroughputExceededException",
            Self::LimitExceeded => "LimitExceededException",
            Self::KmsThrottling => "KMSThrottlingException",
            Self::InternalFailure => "InternalFailure",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Unknown(code) => code,
        }
    }

    /// Failure class for this code.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::ResourceNotFound
            | Self::InvalidArgument
            | Self::AccessDenied
            | Self::KmsDisabled
            | Self::KmsNotFound
            | Self::KmsAccessDenied
            | Self::KmsInvalidState => FailureClass::Permanent,
            Self::ProvisionedThroughputExceeded
            | Self::LimitExceeded
            | Self::KmsThrottling
            | Self::InternalFailure
            | Self::ServiceUnavailable => FailureClass::Transient,
            // Availability over false permanent rejection.
            Self::Unknown(_) => FailureClass::Transient,
        }
    }

    /// Whether the code signals throughput throttling specifically.
    #[must_use]
    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceeded | Self::LimitExceeded | Self::KmsThrottling
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw service error code.
#[must_use]
pub fn classify_code(code: &str) -> FailureClass {
    ErrorCode::parse(code).class()
}

/// Classify an attempt-level API error.
#[must_use]
pub fn classify(error: &ApiError) -> FailureClass {
    classify_code(&error.code)
}

/// What the batcher should do after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// Every submitted record was accepted.
    Success,
    /// Abandon the batch; no retry can fix this.
    Permanent { code: String, message: String },
    /// Retry the records at `failed` (positions within the submitted slice,
    /// ascending).
    Transient {
        failed: Vec<usize>,
        reason: String,
        throttled: bool,
    },
}

impl AttemptVerdict {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Success => FailureClass::Success,
            Self::Permanent { .. } => FailureClass::Permanent,
            Self::Transient { .. } => FailureClass::Transient,
        }
    }
}

/// Interpret a reply to a submission of `submitted` records.
///
/// Attempt-level classification wins over per-record detail. Per-record
/// failures are always transient. Aligned per-record outcomes are
/// authoritative about which records were accepted.
#[must_use]
pub fn classify_reply(reply: &SubmitReply, submitted: usize) -> AttemptVerdict {
    if reply.is_success() {
        return AttemptVerdict::Success;
    }
    if let Some(error) = &reply.error {
        if classify(error) == FailureClass::Permanent {
            return AttemptVerdict::Permanent {
                code: error.code.clone(),
                message: error.message.clone(),
            };
        }
    }

    if reply.outcomes.len() == submitted {
        let failed: Vec<usize> = reply
            .outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| outcome.is_failed().then_some(i))
            .collect();
        if failed.is_empty() {
            return AttemptVerdict::Success;
        }
        let (reason, throttled) = transient_reason(reply);
        return AttemptVerdict::Transient {
            failed,
            reason,
            throttled,
        };
    }

    // Outcomes do not line up with what was sent; fall back to the summary.
    // A transient attempt error retries the whole slice.
    if reply.error.is_some() || reply.failed_record_count >= submitted {
        let (reason, throttled) = transient_reason(reply);
        return AttemptVerdict::Transient {
            failed: (0..submitted).collect(),
            reason,
            throttled,
        };
    }
    AttemptVerdict::Permanent {
        code: MALFORMED_REPLY_CODE.to_string(),
        message: format!(
            "{} outcomes for {submitted} submitted records with {} failures; \
             failed records cannot be identified",
            reply.outcomes.len(),
            reply.failed_record_count
        ),
    }
}

/// Last-seen reason for a transient attempt and whether it was throttling.
fn transient_reason(reply: &SubmitReply) -> (String, bool) {
    if let Some(error) = &reply.error {
        let throttled = ErrorCode::parse(&error.code).is_throttling();
        return (error.to_string(), throttled);
    }
    let last_failed = reply.outcomes.iter().rev().find_map(|outcome| match outcome {
        RecordOutcome::Failed {
            error_code,
            error_message,
        } => Some((error_code, error_message)),
        RecordOutcome::Accepted { .. } => None,
    });
    match last_failed {
        Some((code, message)) => {
            let throttled = reply.outcomes.iter().any(|outcome| {
                matches!(outcome, RecordOutcome::Failed { error_code, .. }
                    if ErrorCode::parse(error_code).is_throttling())
            });
            (format!("{code}: {message}"), throttled)
        }
        None => (
            format!("{} records failed without detail", reply.failed_record_count),
            false,
        ),
    }
}
