use anyhow::Result;
use bioparticle_common::{EngineConfig, Snapshot};
use bioparticle_engine::Runner;
use clap::Parser;
use log::{debug, error, info, trace};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Headless runner: advances the configured processes and exports the
/// recorded frames.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the runner configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting bioparticle engine...");

    // --- Load Configuration ---
    let config = EngineConfig::load(&args.config)?;
    debug!("Runner configuration: {:#?}", config.timing);

    #[cfg(feature = "parallel")]
    info!("Using {} Rayon threads across systems.", rayon::current_num_threads());

    // --- Initialize Systems ---
    let mut runner = Runner::new(config)?;
    info!(
        "Initialized {} system(s) with {} particles.",
        runner.manager().len(),
        runner.current_particle_count()
    );

    // --- Simulation Loop ---
    let dt = runner.config().timing.dt;
    let total_steps = runner.total_steps();
    let record_interval_steps = runner.record_interval_steps();
    info!("Recording snapshot every {} steps ({:.3} s).", record_interval_steps, record_interval_steps as f64 * dt);

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // --- Initial Snapshot (time = 0) ---
    runner.record_snapshot();

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        runner.step();
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;

        if should_print_status || is_record_step || is_last_step {
            let stats = runner.manager().statistics();
            info!(
                "Step [{}/{}] ({:.2} s) | Particles: {} | Bound pairs: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                runner.time(),
                stats.active_particles,
                stats.bound_pairs,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            // --- Record Snapshot ---
            if is_record_step || is_last_step {
                runner.record_snapshot();
            }
        } else {
            trace!("Step [{}/{}] completed in {:.2} ms", step + 1, total_steps, step_duration.as_secs_f64() * 1000.0);
        }
    }

    let total_duration = start_time.elapsed();
    info!("Simulation finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    let output = runner.config().output.clone();
    if output.save_stats {
        let format = output.format.as_deref().unwrap_or("json");
        if let Err(e) = export_snapshots(&output.base_filename, format, runner.get_recorded_snapshots()) {
            error!("Error saving snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                writer.write_record(["system", "id", "bio_type", "x", "y", "z"])?;
                for result in runner.get_results() {
                    writer.write_record(&[
                        result.system,
                        result.id.to_string(),
                        result.bio_type.to_string(),
                        format!("{:.4}", result.position.x),
                        format!("{:.4}", result.position.y),
                        format!("{:.4}", result.position.z),
                    ])?;
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn export_snapshots(base_filename: &str, format: &str, snapshots: &[Snapshot]) -> Result<()> {
    match format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base_filename);
            bincode::serialize_into(File::create(&filename)?, snapshots)?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            rmp_serde::encode::write(&mut File::create(&filename)?, snapshots)?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base_filename);
            let json_string = serde_json::to_string(snapshots)?;
            File::create(&filename)?.write_all(json_string.as_bytes())?;
            info!("All snapshots saved to {} ({}MB)", filename, json_string.len() / 1_048_576);
        }
    }
    Ok(())
}
