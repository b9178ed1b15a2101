// src/results.rs
//! Decomposition output and JSON export

use crate::error::DecompResult;
use crate::signal::AnalysisWindow;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// One motor unit after reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorUnit {
    pub electrode: usize,
    /// Window whose stream found the unit
    pub window: usize,
    /// Separation filter in extended-observation space
    pub filter: Array1<f64>,
    /// Normalized full-length pulse train
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pulse_train: Vec<f64>,
    /// Ascending discharge times in recording samples
    pub discharges: Vec<usize>,
    pub sil: f64,
    /// CoV of the inter-spike intervals
    pub cov: f64,
}

impl MotorUnit {
    /// Mean discharge rate in Hz over the span of the discharges
    pub fn mean_discharge_rate(&self, sample_rate: f64) -> f64 {
        match (self.discharges.first(), self.discharges.last()) {
            (Some(&first), Some(&last)) if last > first => {
                (self.discharges.len() - 1) as f64 * sample_rate / (last - first) as f64
            }
            _ => 0.0,
        }
    }
}

/// Motor units of one electrode array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectrodeDecomposition {
    pub electrode: usize,
    pub geometry: String,
    pub extension_factor: usize,
    pub windows: Vec<AnalysisWindow>,
    pub motor_units: Vec<MotorUnit>,
}

impl ElectrodeDecomposition {
    /// Pulse trains stacked as motor units x samples
    pub fn pulse_trains(&self, samples: usize) -> Array2<f64> {
        let mut matrix = Array2::zeros((self.motor_units.len(), samples));
        for (mut row, unit) in matrix.rows_mut().into_iter().zip(&self.motor_units) {
            for (dst, &src) in row.iter_mut().zip(&unit.pulse_train) {
                *dst = src;
            }
        }
        matrix
    }
}

/// Complete decomposition of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub sample_rate: f64,
    pub samples: usize,
    pub electrodes: Vec<ElectrodeDecomposition>,
}

impl DecompositionResult {
    pub fn total_motor_units(&self) -> usize {
        self.electrodes.iter().map(|e| e.motor_units.len()).sum()
    }

    pub fn motor_unit(&self, electrode: usize, mu: usize) -> Option<&MotorUnit> {
        self.electrodes.get(electrode)?.motor_units.get(mu)
    }

    /// Discharge times of motor unit `mu` on `electrode`
    pub fn discharge_times(&self, electrode: usize, mu: usize) -> Option<&[usize]> {
        self.motor_unit(electrode, mu).map(|unit| unit.discharges.as_slice())
    }

    pub fn pulse_trains(&self, electrode: usize) -> Option<Array2<f64>> {
        self.electrodes.get(electrode).map(|e| e.pulse_trains(self.samples))
    }

    pub fn to_json(&self) -> DecompResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> DecompResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> DecompResult<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> DecompResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
