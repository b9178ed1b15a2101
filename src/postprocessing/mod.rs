// src/postprocessing/mod.rs
//! Post-processing of accepted motor units
//!
//! Reconciliation projects window filters onto the whole recording,
//! outlier rejection cleans the discharge trains and duplicate removal
//! merges units found more than once.

pub mod duplicates;
pub mod outliers;
pub mod reconciliation;

pub use duplicates::DuplicateDetector;
pub use outliers::{discharge_rates, remove_outliers, OutlierReport};
pub use reconciliation::Reconciler;

use crate::results::ElectrodeDecomposition;
use tracing::info;

/// Duplicate removal over the units of all electrodes together
///
/// Units keep their electrode; an electrode can end up with fewer units
/// when its copy of a shared unit had the higher CoV.
pub fn remove_duplicates_between_electrodes(
    electrodes: &mut [ElectrodeDecomposition],
    detector: &DuplicateDetector,
) {
    let before: usize = electrodes.iter().map(|e| e.motor_units.len()).sum();
    let pooled: Vec<_> = electrodes
        .iter_mut()
        .flat_map(|e| std::mem::take(&mut e.motor_units))
        .collect();

    for unit in detector.remove_duplicates(pooled) {
        if let Some(target) = electrodes.iter_mut().find(|e| e.electrode == unit.electrode) {
            target.motor_units.push(unit);
        }
    }

    let after: usize = electrodes.iter().map(|e| e.motor_units.len()).sum();
    info!(before, after, "Removed duplicates across electrodes");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::MotorUnit;
    use ndarray::Array1;

    fn electrode(index: usize, trains: Vec<(Vec<usize>, f64)>) -> ElectrodeDecomposition {
        ElectrodeDecomposition {
            electrode: index,
            geometry: "GR10MM0804".to_string(),
            extension_factor: 31,
            windows: Vec::new(),
            motor_units: trains
                .into_iter()
                .map(|(discharges, cov)| MotorUnit {
                    electrode: index,
                    window: 0,
                    filter: Array1::zeros(2),
                    pulse_train: Vec::new(),
                    discharges,
                    sil: 0.9,
                    cov,
                })
                .collect(),
        }
    }

    #[test]
    fn test_shared_unit_kept_on_one_electrode() {
        let shared: Vec<usize> = (0..30).map(|i| 100 + i * 150).collect();
        let own: Vec<usize> = (0..20).map(|i| 160 + i * 211).collect();
        let mut electrodes = vec![
            electrode(0, vec![(shared.clone(), 0.2), (own.clone(), 0.1)]),
            electrode(1, vec![(shared.iter().map(|t| t + 2).collect(), 0.12)]),
        ];

        remove_duplicates_between_electrodes(&mut electrodes, &DuplicateDetector::new(51, 1, 0.3));
        assert_eq!(electrodes[0].motor_units.len(), 1);
        assert_eq!(electrodes[0].motor_units[0].discharges, own);
        assert_eq!(electrodes[1].motor_units.len(), 1);
    }
}
