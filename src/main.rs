use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::info;

use playrig::app::Runtime;
use playrig::config;
use playrig::inputs::Inputs;
use playrig::utils::logging::{init_logging, log_system_info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frames of scripted driving performed by the headless run.
const RUN_FRAMES: u64 = 900;

/// Scripted key events standing in for a host window: a forward run with a
/// boost burst, a jump off the boost, then a full reset near the end.
fn script(tick: u64, inputs: &mut Inputs) {
    match tick {
        60 => inputs.key_down("KeyW"),
        240 => inputs.key_down("ShiftLeft"),
        360 => {
            inputs.key_up("ShiftLeft");
            inputs.key_down("Space");
        }
        365 => inputs.key_up("Space"),
        480 => inputs.key_down("KeyA"),
        600 => {
            inputs.key_up("KeyA");
            inputs.key_up("KeyW");
        }
        720 => inputs.key_down("KeyR"),
        725 => inputs.key_up("KeyR"),
        _ => {}
    }
}

fn main() -> Result<()> {
    init_logging();
    log_system_info();
    info!("playrig {} starting", VERSION);

    let settings = config::load_settings().unwrap_or_else(|| {
        let defaults = config::Settings::default();
        if let Err(error) = config::save_settings(&defaults) {
            tracing::warn!(%error, "could not write default settings");
        } else {
            info!("wrote default settings file");
        }
        defaults
    });

    let mut runtime = Runtime::new(settings)?;
    runtime.build_playground()?;
    let mut ticker = Runtime::wire_ticker(&runtime.settings);

    let frame_budget = Duration::from_millis(16);
    while ticker.tick() < RUN_FRAMES {
        let started = Instant::now();
        script(ticker.tick(), &mut runtime.inputs);
        ticker.update(&mut runtime, started);
        if let Some(remaining) = frame_budget.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    info!(
        frames = ticker.tick(),
        sim_seconds = ticker.elapsed(),
        speed = runtime.vehicle.speed(&runtime.physics),
        grounded = runtime.vehicle.is_grounded(),
        "headless run complete"
    );
    Ok(())
}
