// src/error.rs
//! Unified error handling for the decomposition engine
//!
//! Numerical degeneracy (flat channels, empty eigenspaces, too few peaks) is
//! handled locally by the stage that meets it and never reaches this type.
//! What does reach it are shape violations, configuration mistakes and
//! cancellation, each carrying enough context for the caller to retry the
//! affected electrode or window.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Processing stages, used to tag where a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    Conditioning,
    Extension,
    Whitening,
    Separation,
    SpikeDetection,
    Refinement,
    PeelOff,
    Reconciliation,
    PostProcessing,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Conditioning => "conditioning",
            ProcessingStage::Extension => "extension",
            ProcessingStage::Whitening => "whitening",
            ProcessingStage::Separation => "separation",
            ProcessingStage::SpikeDetection => "spike-detection",
            ProcessingStage::Refinement => "refinement",
            ProcessingStage::PeelOff => "peel-off",
            ProcessingStage::Reconciliation => "reconciliation",
            ProcessingStage::PostProcessing => "post-processing",
        };
        f.write_str(name)
    }
}

/// Unified error type for the decomposition engine
#[derive(Debug, Error)]
pub enum DecompositionError {
    /// Invalid or inconsistent configuration values
    #[error("[CONFIG] {component}: {reason}")]
    Configuration { component: String, reason: String },

    /// The electrode array name is not in the geometry registry
    #[error("[CONFIG] unrecognized electrode array geometry '{name}'")]
    UnknownGeometry { name: String },

    /// Matrix or sequence dimensions do not line up
    #[error("[SHAPE] {stage}: expected {expected}, got {actual}")]
    ShapeMismatch {
        stage: ProcessingStage,
        expected: String,
        actual: String,
    },

    /// Input signal rejected before processing
    #[error("[DATA] invalid signal: {reason}")]
    InvalidSignal { reason: String },

    /// Numerical failure that cannot be handled locally
    #[error("[PROCESSING] {stage} stage error: {reason}")]
    Processing {
        stage: ProcessingStage,
        reason: String,
    },

    /// Failure scoped to one electrode (and optionally one window)
    #[error("electrode {electrode}{}: {source}", window_suffix(.window))]
    Electrode {
        electrode: usize,
        window: Option<usize>,
        #[source]
        source: Box<DecompositionError>,
    },

    /// The caller aborted the run at a checkpoint
    #[error("decomposition cancelled before electrode {electrode}{}", window_suffix(.window))]
    Cancelled {
        electrode: usize,
        window: Option<usize>,
    },

    #[error("configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn window_suffix(window: &Option<usize>) -> String {
    window.map(|w| format!(", window {w}")).unwrap_or_default()
}

/// Result type alias for decomposition operations
pub type DecompResult<T> = Result<T, DecompositionError>;

impl DecompositionError {
    /// Configuration error for a named component
    pub fn configuration(component: &str, reason: impl Into<String>) -> Self {
        DecompositionError::Configuration {
            component: component.to_string(),
            reason: reason.into(),
        }
    }

    pub fn shape(stage: ProcessingStage, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        DecompositionError::ShapeMismatch {
            stage,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn processing(stage: ProcessingStage, reason: impl Into<String>) -> Self {
        DecompositionError::Processing {
            stage,
            reason: reason.into(),
        }
    }

    /// Wrap with electrode/window context, leaving cancellations and
    /// already-wrapped errors untouched
    pub fn in_electrode(self, electrode: usize, window: Option<usize>) -> Self {
        match self {
            err @ (DecompositionError::Electrode { .. } | DecompositionError::Cancelled { .. }) => err,
            err => DecompositionError::Electrode {
                electrode,
                window,
                source: Box::new(err),
            },
        }
    }

    /// Electrode index this error is attributed to, if any
    pub fn electrode(&self) -> Option<usize> {
        match self {
            DecompositionError::Electrode { electrode, .. }
            | DecompositionError::Cancelled { electrode, .. } => Some(*electrode),
            _ => None,
        }
    }

    /// Whether the run was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DecompositionError::Cancelled { .. })
    }
}

/// Convenience trait for attaching electrode context to results
pub trait ElectrodeContext<T> {
    fn electrode_context(self, electrode: usize, window: Option<usize>) -> DecompResult<T>;
}

impl<T> ElectrodeContext<T> for DecompResult<T> {
    fn electrode_context(self, electrode: usize, window: Option<usize>) -> DecompResult<T> {
        self.map_err(|err| err.in_electrode(electrode, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_constructor() {
        let err = DecompositionError::configuration("thresholds", "sil_threshold must be in [0, 1]");
        match err {
            DecompositionError::Configuration { component, reason } => {
                assert_eq!(component, "thresholds");
                assert!(reason.contains("sil_threshold"));
            }
            _ => panic!("Expected configuration error"),
        }
    }

    #[test]
    fn test_error_display() {
        let err = DecompositionError::shape(ProcessingStage::Extension, "k >= 1", "k = 0");
        let display = format!("{}", err);
        assert!(display.contains("extension"));
        assert!(display.contains("k = 0"));
    }

    #[test]
    fn test_electrode_context_wraps_once() {
        let result: DecompResult<()> = Err(DecompositionError::UnknownGeometry {
            name: "XX99".to_string(),
        });
        let wrapped = result.electrode_context(2, Some(1)).electrode_context(5, None);

        let err = wrapped.unwrap_err();
        assert_eq!(err.electrode(), Some(2));
        let display = format!("{}", err);
        assert!(display.contains("electrode 2, window 1"));
        assert!(display.contains("XX99"));
    }

    #[test]
    fn test_cancellation_is_not_wrapped() {
        let err = DecompositionError::Cancelled { electrode: 3, window: Some(0) }.in_electrode(7, None);
        assert!(err.is_cancelled());
        assert_eq!(err.electrode(), Some(3));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DecompositionError>();
    }
}
