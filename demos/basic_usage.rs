// demos/basic_usage.rs
//! Basic usage example: decompose a synthetic two-unit recording

use crossbeam::channel;
use emg_decomp::{
    simulation::{SimulatedUnit, SyntheticMixture},
    ArrayGeometry, ConfigLoader, DecompositionEngine, ElectrodeLayout, EmgType, ProgressEvent,
};
use std::thread;

const FS: f64 = 2048.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let info = emg_decomp::version_info();
    println!("{} {} basic usage example", info.name, info.version);
    println!("================================");

    // Configuration from files and EMG_DECOMP_* variables, on top of defaults
    let mut config = ConfigLoader::new().load()?;
    config.segmentation.extension_target = 80;
    config.segmentation.window_count = 2;
    config.segmentation.edge_trim_s = 0.05;
    println!("Configuration loaded");

    println!("Simulating 8 channels, 4 s at {} Hz...", FS);
    let recording = SyntheticMixture::new(8, 4 * FS as usize, FS)
        .with_unit(SimulatedUnit::new(155))
        .with_unit(SimulatedUnit::new(205).with_amplitude(0.8))
        .with_noise(0.02)
        .generate()?;

    let geometry = ArrayGeometry::custom("DEMO0208", 2, 4, 8, 5.0, EmgType::Surface)?;
    let bundle = recording
        .to_bundle()?
        .with_electrode(ElectrodeLayout::contiguous(geometry, 0));

    let (sender, receiver) = channel::unbounded();
    let engine = DecompositionEngine::new(config)?.with_progress(sender);
    let worker = thread::spawn(move || engine.decompose(&bundle));

    // The channel closes once the engine is dropped with the worker
    for event in receiver.iter() {
        match event {
            ProgressEvent::ElectrodeStarted { electrode, windows, extension_factor } => {
                println!("Electrode {}: {} windows, extension factor {}", electrode, windows, extension_factor);
            }
            ProgressEvent::WindowFinished { window, accepted, candidates, .. } => {
                println!("  window {}: {}/{} sources accepted", window, accepted, candidates);
            }
            ProgressEvent::PostProcessing { candidates, .. } => {
                println!("  post-processing {} candidates", candidates);
            }
            ProgressEvent::ElectrodeFinished { electrode, motor_units } => {
                println!("Electrode {} finished with {} motor units", electrode, motor_units);
            }
            ProgressEvent::Finished { motor_units } => {
                println!("Decomposition finished: {} motor units", motor_units);
            }
        }
    }

    let result = worker.join().map_err(|_| "decomposition thread panicked")??;

    for unit in result.electrodes.iter().flat_map(|e| &e.motor_units) {
        println!(
            "MU from window {}: {} discharges, {:.1} Hz, SIL {:.3}, CoV {:.3}",
            unit.window,
            unit.discharges.len(),
            unit.mean_discharge_rate(FS),
            unit.sil,
            unit.cov
        );
    }

    println!("\nSimulated trains: {} and {} discharges", recording.discharges[0].len(), recording.discharges[1].len());
    println!("Example completed successfully!");
    Ok(())
}
