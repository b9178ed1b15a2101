// src/signal.rs
//! Input recordings and their split into analysis windows

use crate::config::ArrayGeometry;
use crate::error::{DecompResult, DecompositionError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One electrode array inside a recording
#[derive(Debug, Clone, PartialEq)]
pub struct ElectrodeLayout {
    pub geometry: ArrayGeometry,
    /// Rows of the recording matrix belonging to this array, in grid order
    pub channels: Vec<usize>,
    /// Per-channel exclusion mask, same length as `channels`
    pub discarded: Vec<bool>,
}

impl ElectrodeLayout {
    pub fn new(geometry: ArrayGeometry, channels: Vec<usize>) -> Self {
        let discarded = vec![false; channels.len()];
        Self {
            geometry,
            channels,
            discarded,
        }
    }

    /// Layout over `channel_count` consecutive rows starting at `first_row`
    pub fn contiguous(geometry: ArrayGeometry, first_row: usize) -> Self {
        let channels = (first_row..first_row + geometry.channel_count).collect();
        Self::new(geometry, channels)
    }

    pub fn with_discarded(mut self, discarded: Vec<bool>) -> Self {
        self.discarded = discarded;
        self
    }

    /// Recording rows that take part in the decomposition
    pub fn active_channels(&self) -> Vec<usize> {
        self.channels
            .iter()
            .zip(&self.discarded)
            .filter_map(|(&row, &discarded)| (!discarded).then_some(row))
            .collect()
    }

    fn validate(&self, electrode: usize, rows: usize) -> DecompResult<()> {
        let component = format!("electrode {}", electrode);
        if self.channels.len() != self.geometry.channel_count {
            return Err(DecompositionError::configuration(
                &component,
                format!(
                    "geometry {} expects {} channels, layout lists {}",
                    self.geometry.name,
                    self.geometry.channel_count,
                    self.channels.len()
                ),
            ));
        }
        if self.discarded.len() != self.channels.len() {
            return Err(DecompositionError::configuration(
                &component,
                format!(
                    "discard mask has {} entries for {} channels",
                    self.discarded.len(),
                    self.channels.len()
                ),
            ));
        }
        if let Some(&row) = self.channels.iter().find(|&&row| row >= rows) {
            return Err(DecompositionError::configuration(
                &component,
                format!("channel row {} outside recording with {} rows", row, rows),
            ));
        }
        if self.active_channels().is_empty() {
            return Err(DecompositionError::configuration(&component, "every channel is discarded"));
        }
        Ok(())
    }
}

/// Recording handed to the engine
#[derive(Debug, Clone)]
pub struct SignalBundle {
    /// Channels x samples
    pub data: Array2<f64>,
    pub sample_rate: f64,
    pub electrodes: Vec<ElectrodeLayout>,
    /// Force or target trace recorded alongside the EMG
    pub reference: Option<Vec<f64>>,
    pub analysis_range: Option<Range<usize>>,
}

impl SignalBundle {
    pub fn new(data: Array2<f64>, sample_rate: f64) -> DecompResult<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(DecompositionError::InvalidSignal {
                reason: format!("sample rate must be positive, got {}", sample_rate),
            });
        }
        if data.is_empty() {
            return Err(DecompositionError::InvalidSignal {
                reason: "empty recording".to_string(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(DecompositionError::InvalidSignal {
                reason: "recording contains non-finite samples".to_string(),
            });
        }
        Ok(Self {
            data,
            sample_rate,
            electrodes: Vec::new(),
            reference: None,
            analysis_range: None,
        })
    }

    pub fn with_electrode(mut self, layout: ElectrodeLayout) -> Self {
        self.electrodes.push(layout);
        self
    }

    pub fn with_reference(mut self, reference: Vec<f64>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_analysis_range(mut self, range: Range<usize>) -> Self {
        self.analysis_range = Some(range);
        self
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn validate(&self) -> DecompResult<()> {
        if self.electrodes.is_empty() {
            return Err(DecompositionError::configuration("signal", "no electrode layouts"));
        }
        for (idx, layout) in self.electrodes.iter().enumerate() {
            layout.validate(idx, self.data.nrows())?;
        }
        if let Some(reference) = &self.reference {
            if reference.len() != self.samples() {
                return Err(DecompositionError::InvalidSignal {
                    reason: format!(
                        "reference has {} samples, recording has {}",
                        reference.len(),
                        self.samples()
                    ),
                });
            }
        }
        if let Some(range) = &self.analysis_range {
            if range.start >= range.end || range.end > self.samples() {
                return Err(DecompositionError::configuration(
                    "signal",
                    format!("analysis range {:?} outside 0..{}", range, self.samples()),
                ));
            }
        }
        Ok(())
    }

    /// Active channels of one electrode (rows in layout order)
    pub fn electrode_data(&self, electrode: usize) -> DecompResult<Array2<f64>> {
        let layout = self.electrodes.get(electrode).ok_or_else(|| {
            DecompositionError::configuration("signal", format!("no electrode {}", electrode))
        })?;
        let rows = layout.active_channels();
        let mut out = Array2::zeros((rows.len(), self.samples()));
        for (dst, &src) in rows.iter().enumerate() {
            out.row_mut(dst).assign(&self.data.row(src));
        }
        Ok(out)
    }

    /// Range to decompose: the explicit one, else the reference plateau,
    /// else the whole recording
    pub fn resolve_range(&self, plateau_fraction: Option<f64>) -> Range<usize> {
        if let Some(range) = &self.analysis_range {
            return range.clone();
        }
        if let (Some(reference), Some(fraction)) = (&self.reference, plateau_fraction) {
            if let Some(range) = plateau(reference, fraction) {
                return range;
            }
        }
        0..self.samples()
    }
}

/// Span from the first to the last sample at or above `fraction * max`
fn plateau(reference: &[f64], fraction: f64) -> Option<Range<usize>> {
    let peak = reference.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(peak > 0.0) {
        return None;
    }
    let level = fraction * peak;
    let first = reference.iter().position(|&v| v >= level)?;
    let last = reference.iter().rposition(|&v| v >= level)?;
    Some(first..last + 1)
}

/// Half-open slice of the analysis range processed as one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl AnalysisWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Tile `range` with `count` equal windows, the last taking the remainder
///
/// Every window holds at least one sample; a range shorter than `count`
/// is rejected rather than silently tiled with fewer windows.
pub fn segment(range: Range<usize>, count: usize) -> DecompResult<Vec<AnalysisWindow>> {
    let length = range.end.saturating_sub(range.start);
    if count == 0 || length < count {
        return Err(DecompositionError::configuration(
            "segmentation",
            format!(
                "analysis range {}..{} of {} samples cannot hold {} windows",
                range.start, range.end, length, count
            ),
        ));
    }
    let step = length / count;
    Ok((0..count)
        .map(|index| {
            let start = range.start + index * step;
            let end = if index + 1 == count { range.end } else { start + step };
            AnalysisWindow { index, start, end }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmgType;

    fn geometry(channels: usize) -> ArrayGeometry {
        ArrayGeometry::custom("TEST", 1, channels, channels, 5.0, EmgType::Surface).unwrap()
    }

    #[test]
    fn test_segment_tiles_range() {
        let windows = segment(10..110, 3).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!((windows[0].start, windows[0].end), (10, 43));
        assert_eq!((windows[1].start, windows[1].end), (43, 76));
        assert_eq!((windows[2].start, windows[2].end), (76, 110));
        assert_eq!(windows.iter().map(|w| w.len()).sum::<usize>(), 100);
    }

    #[test]
    fn test_segment_rejects_short_range() {
        assert_eq!(segment(0..4, 4).unwrap().len(), 4);
        let err = segment(0..3, 4).unwrap_err();
        assert!(matches!(err, DecompositionError::Configuration { .. }));
        assert!(err.to_string().contains("cannot hold 4 windows"), "{err}");
        assert!(segment(5..5, 1).is_err());
        assert!(segment(0..10, 0).is_err());
    }

    #[test]
    fn test_range_resolution_order() {
        let data = Array2::zeros((2, 100));
        let mut reference = vec![0.0; 100];
        for v in &mut reference[30..60] {
            *v = 1.0;
        }
        reference[45] = 2.0;

        let bundle = SignalBundle::new(data, 1000.0).unwrap().with_reference(reference);
        assert_eq!(bundle.resolve_range(None), 0..100);
        assert_eq!(bundle.resolve_range(Some(0.5)), 30..60);
        assert_eq!(bundle.resolve_range(Some(0.9)), 45..46);

        let explicit = bundle.with_analysis_range(5..50);
        assert_eq!(explicit.resolve_range(Some(0.5)), 5..50);
    }

    #[test]
    fn test_masked_channels_are_dropped() {
        let data = Array2::from_shape_fn((4, 3), |(r, c)| (10 * r + c) as f64);
        let layout = ElectrodeLayout::contiguous(geometry(3), 1).with_discarded(vec![false, true, false]);
        let bundle = SignalBundle::new(data, 1000.0).unwrap().with_electrode(layout);
        bundle.validate().unwrap();

        let active = bundle.electrode_data(0).unwrap();
        assert_eq!(active.nrows(), 2);
        assert_eq!(active.row(0).to_vec(), vec![10.0, 11.0, 12.0]);
        assert_eq!(active.row(1).to_vec(), vec![30.0, 31.0, 32.0]);
    }

    #[test]
    fn test_validation_errors() {
        let data = Array2::zeros((4, 10));
        let bundle = SignalBundle::new(data.clone(), 1000.0).unwrap();
        assert!(bundle.validate().is_err());

        // Channel count disagrees with the geometry
        let layout = ElectrodeLayout::new(geometry(3), vec![0, 1]);
        let bundle = SignalBundle::new(data.clone(), 1000.0).unwrap().with_electrode(layout);
        assert!(matches!(bundle.validate(), Err(DecompositionError::Configuration { .. })));

        let layout = ElectrodeLayout::contiguous(geometry(3), 2);
        let bundle = SignalBundle::new(data.clone(), 1000.0).unwrap().with_electrode(layout);
        assert!(bundle.validate().is_err());

        let mut bad = data;
        bad[[0, 0]] = f64::NAN;
        assert!(matches!(
            SignalBundle::new(bad, 1000.0),
            Err(DecompositionError::InvalidSignal { .. })
        ));
    }
}
