use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a component substituted its documented default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoContext,
    ModelCall(String),
    InvalidOutput(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContext => f.write_str("no relevant knowledge-base context"),
            Self::ModelCall(detail) => write!(f, "model call failed: {detail}"),
            Self::InvalidOutput(detail) => write!(f, "model output rejected: {detail}"),
        }
    }
}

/// Result of a degrading component: the model's answer, or a default plus the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Completed { value: T },
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Outcome<T> {
    pub fn completed(value: T) -> Self {
        Self::Completed { value }
    }

    pub fn fallback(value: T, reason: FallbackReason) -> Self {
        Self::Fallback { value, reason }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Completed { value } | Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Completed { value } | Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Completed { .. } => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Completed { value } => Outcome::Completed { value: f(value) },
            Self::Fallback { value, reason } => Outcome::Fallback { value: f(value), reason },
        }
    }
}
