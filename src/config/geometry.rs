// src/config/geometry.rs
//! Electrode array geometries recognized by the engine
//!
//! The geometry fixes the channel count an electrode must supply and the EMG
//! type, which in turn selects the conditioning passband. Names coming from
//! acquisition metadata are resolved here and unknown names are rejected
//! rather than defaulted.

use crate::error::{DecompResult, DecompositionError};
use serde::{Deserialize, Serialize};

/// Recording modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmgType {
    Surface,
    Intramuscular,
}

/// Electrode array layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayGeometry {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub channel_count: usize,
    /// Inter-electrode distance in millimetres
    pub ied_mm: f64,
    pub emg_type: EmgType,
}

// (name, rows, columns, channels, ied_mm, type)
const REGISTRY: &[(&str, usize, usize, usize, f64, EmgType)] = &[
    ("GR04MM1305", 13, 5, 64, 4.0, EmgType::Surface),
    ("GR08MM1305", 13, 5, 64, 8.0, EmgType::Surface),
    ("GR10MM0808", 8, 8, 64, 10.0, EmgType::Surface),
    ("GR10MM0804", 8, 4, 32, 10.0, EmgType::Surface),
    ("HD04MM1305", 13, 5, 64, 4.0, EmgType::Surface),
    ("HD08MM1305", 13, 5, 64, 8.0, EmgType::Surface),
    ("HD10MM0808", 8, 8, 64, 10.0, EmgType::Surface),
    ("HD10MM0804", 8, 4, 32, 10.0, EmgType::Surface),
    ("MYOMRF-4x8", 4, 8, 32, 1.0, EmgType::Intramuscular),
    ("MYOMNP-1x32", 1, 32, 32, 1.0, EmgType::Intramuscular),
];

impl ArrayGeometry {
    /// Resolve a registered array name (case-insensitive)
    pub fn from_name(name: &str) -> DecompResult<Self> {
        REGISTRY
            .iter()
            .find(|(registered, ..)| registered.eq_ignore_ascii_case(name.trim()))
            .map(|&(registered, rows, columns, channel_count, ied_mm, emg_type)| Self {
                name: registered.to_string(),
                rows,
                columns,
                channel_count,
                ied_mm,
                emg_type,
            })
            .ok_or_else(|| DecompositionError::UnknownGeometry {
                name: name.to_string(),
            })
    }

    /// Build a layout that is not in the registry
    ///
    /// The 13x5 grids leave one corner empty, so `channel_count` is passed
    /// explicitly rather than derived from `rows * columns`.
    pub fn custom(
        name: &str,
        rows: usize,
        columns: usize,
        channel_count: usize,
        ied_mm: f64,
        emg_type: EmgType,
    ) -> DecompResult<Self> {
        if channel_count == 0 || channel_count > rows * columns {
            return Err(DecompositionError::configuration(
                "geometry",
                format!(
                    "{} channels do not fit a {}x{} array",
                    channel_count, rows, columns
                ),
            ));
        }
        if ied_mm.is_nan() || ied_mm <= 0.0 {
            return Err(DecompositionError::configuration(
                "geometry",
                "inter-electrode distance must be positive",
            ));
        }
        Ok(Self {
            name: name.to_string(),
            rows,
            columns,
            channel_count,
            ied_mm,
            emg_type,
        })
    }

    /// Names of all registered arrays
    pub fn registered_names() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, ..)| *name)
    }
}
