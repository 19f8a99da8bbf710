//! Error types for rastergraph.
//!
//! All engine failures are reported through [`OperatorError`]. Each variant
//! carries structured context (operator, band, rectangle, parameter) and maps
//! onto one of three coarse [`ErrorKind`]s so callers can react without
//! parsing messages:
//! - configuration errors are detected at instantiation or initialization and
//!   are fatal to that operator instance
//! - computation errors abort the tile being computed; nothing is cached
//! - cancellation is not a failure of the graph and may be retried

use crate::core::rect::Rectangle;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

macro_rules! short_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.0.to_string()[..8])
            }
        }
    };
}

short_id!(
    /// Identity of an operator context (one per operator instance).
    ContextId
);

short_id!(
    /// Identity of a band. Tile cache keys are built from it.
    BandId
);

short_id!(
    /// Identity of a raster.
    RasterId
);

/// Coarse classification of an [`OperatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Graph or operator set up incorrectly. Fatal to the instance.
    Configuration,
    /// A tile could not be computed.
    Computation,
    /// The caller cancelled the computation.
    Cancellation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Computation => write!(f, "computation"),
            ErrorKind::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// The engine's error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("No such operator: '{name}'")]
    NoSuchOperator { name: String },

    #[error("[{operator}] {message}")]
    Configuration { operator: String, message: String },

    #[error("[{operator}] Invalid value for parameter '{parameter}': {message}")]
    InvalidParameter {
        operator: String,
        parameter: String,
        message: String,
    },

    #[error("[{operator}] Unknown parameter '{parameter}'")]
    UnknownParameter { operator: String, parameter: String },

    #[error("[{operator}] Source '{port}': {message}")]
    InvalidSource {
        operator: String,
        port: String,
        message: String,
    },

    #[error("[{operator}] Illegal self-reference: target requested while the operator is initializing")]
    SelfReference { operator: String },

    #[error("[{operator}] Target property name '{property}' is declared more than once")]
    DuplicateTargetProperty { operator: String, property: String },

    #[error("Band '{band}' already exists in raster '{raster}'")]
    DuplicateBand { raster: String, band: String },

    #[error("Band '{band}' not found in raster '{raster}'")]
    BandNotFound { raster: String, band: String },

    #[error("[{operator}] Failed to compute band '{band}' at {rect}: {message}")]
    Computation {
        operator: String,
        band: String,
        rect: Rectangle,
        message: String,
    },

    #[error("[{operator}] Operator does not implement tile computation (band '{band}')")]
    NotImplemented { operator: String, band: String },

    #[error("[{operator}] Cyclic tile request for band '{band}' at {rect}")]
    CyclicRequest {
        operator: String,
        band: String,
        rect: Rectangle,
    },

    #[error("Band '{band}' has no readable samples")]
    NoSamples { band: String },

    #[error("Region {rect} does not intersect band '{band}'")]
    InvalidRegion { band: String, rect: Rectangle },

    #[error("Sample buffer mismatch: {0}")]
    BufferMismatch(String),

    #[error("[{operator}] Operator has been disposed")]
    Disposed { operator: String },

    #[error("Computation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl OperatorError {
    /// Create a configuration error for an operator.
    pub fn config(operator: impl Into<String>, message: impl Into<String>) -> Self {
        OperatorError::Configuration {
            operator: operator.into(),
            message: message.into(),
        }
    }

    /// Create a computation error for an operator, band and rectangle.
    pub fn computation(
        operator: impl Into<String>,
        band: impl Into<String>,
        rect: Rectangle,
        message: impl Into<String>,
    ) -> Self {
        OperatorError::Computation {
            operator: operator.into(),
            band: band.into(),
            rect,
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperatorError::Cancelled => ErrorKind::Cancellation,
            OperatorError::Computation { .. }
            | OperatorError::NotImplemented { .. }
            | OperatorError::NoSamples { .. }
            | OperatorError::InvalidRegion { .. }
            | OperatorError::BufferMismatch(_)
            | OperatorError::Disposed { .. }
            | OperatorError::Other(_) => ErrorKind::Computation,
            OperatorError::NoSuchOperator { .. }
            | OperatorError::Configuration { .. }
            | OperatorError::InvalidParameter { .. }
            | OperatorError::UnknownParameter { .. }
            | OperatorError::InvalidSource { .. }
            | OperatorError::SelfReference { .. }
            | OperatorError::DuplicateTargetProperty { .. }
            | OperatorError::DuplicateBand { .. }
            | OperatorError::BandNotFound { .. }
            | OperatorError::CyclicRequest { .. } => ErrorKind::Configuration,
        }
    }

    /// Name of the operator involved, if known.
    pub fn operator(&self) -> Option<&str> {
        match self {
            OperatorError::Configuration { operator, .. }
            | OperatorError::InvalidParameter { operator, .. }
            | OperatorError::UnknownParameter { operator, .. }
            | OperatorError::InvalidSource { operator, .. }
            | OperatorError::SelfReference { operator }
            | OperatorError::DuplicateTargetProperty { operator, .. }
            | OperatorError::Computation { operator, .. }
            | OperatorError::NotImplemented { operator, .. }
            | OperatorError::CyclicRequest { operator, .. }
            | OperatorError::Disposed { operator } => Some(operator),
            _ => None,
        }
    }

    /// Band involved, if known.
    pub fn band(&self) -> Option<&str> {
        match self {
            OperatorError::DuplicateBand { band, .. }
            | OperatorError::BandNotFound { band, .. }
            | OperatorError::Computation { band, .. }
            | OperatorError::NotImplemented { band, .. }
            | OperatorError::CyclicRequest { band, .. }
            | OperatorError::NoSamples { band }
            | OperatorError::InvalidRegion { band, .. } => Some(band),
            _ => None,
        }
    }

    /// Rectangle involved, if known.
    pub fn rectangle(&self) -> Option<Rectangle> {
        match self {
            OperatorError::Computation { rect, .. }
            | OperatorError::CyclicRequest { rect, .. }
            | OperatorError::InvalidRegion { rect, .. } => Some(*rect),
            _ => None,
        }
    }

    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperatorError::Cancelled)
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Only cancellation qualifies; the engine never retries on its own.
    pub fn is_recoverable(&self) -> bool {
        self.is_cancelled()
    }
}

/// Errors raised while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for engine operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_display() {
        let id = ContextId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(OperatorError::Cancelled.kind(), ErrorKind::Cancellation);
        assert_eq!(
            OperatorError::config("Scale", "bad").kind(),
            ErrorKind::Configuration
        );
        let err = OperatorError::computation("Scale", "b1", Rectangle::new(0, 0, 4, 4), "boom");
        assert_eq!(err.kind(), ErrorKind::Computation);
        assert_eq!(err.operator(), Some("Scale"));
        assert_eq!(err.band(), Some("b1"));
        assert_eq!(err.rectangle(), Some(Rectangle::new(0, 0, 4, 4)));
    }

    #[test]
    fn test_error_messages_name_the_parameter() {
        let err = OperatorError::InvalidParameter {
            operator: "Scale".to_string(),
            parameter: "factor".to_string(),
            message: "not a number".to_string(),
        };
        assert!(err.to_string().contains("'factor'"));
        assert!(!err.is_recoverable());
        assert!(OperatorError::Cancelled.is_recoverable());
    }
}
