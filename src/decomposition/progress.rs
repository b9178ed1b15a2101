// src/decomposition/progress.rs
//! Progress reporting and cooperative cancellation

use crate::error::{DecompResult, DecompositionError};
use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Events emitted while a decomposition runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    ElectrodeStarted {
        electrode: usize,
        windows: usize,
        extension_factor: usize,
    },
    WindowFinished {
        electrode: usize,
        window: usize,
        accepted: usize,
        candidates: usize,
    },
    PostProcessing {
        electrode: usize,
        candidates: usize,
    },
    ElectrodeFinished {
        electrode: usize,
        motor_units: usize,
    },
    Finished {
        motor_units: usize,
    },
}

/// Shared abort flag checked between electrodes, windows and candidates
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has fired
    pub fn checkpoint(&self, electrode: usize, window: Option<usize>) -> DecompResult<()> {
        if self.is_cancelled() {
            Err(DecompositionError::Cancelled { electrode, window })
        } else {
            Ok(())
        }
    }
}

/// Optional progress sink; a dropped receiver is ignored
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<Sender<ProgressEvent>>,
}

impl ProgressReporter {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender: Some(sender) }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
