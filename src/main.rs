//! Glide - click-free additive synthesis with real-time control

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glide::config::{self, GlideConfig};
use glide::engine::{self, Player, Recorder};
use glide::presets::{BuiltinPresets, PresetCatalog, PresetLibrary};

mod cli;

use cli::{Cli, Commands};

/// Control loop period for real-time playback
const TICK: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config: config_path,
            duration,
            fade,
        } => {
            println!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;
            play(&cfg, duration, fade)?;
        }

        Commands::Record {
            config: config_path,
            output,
            duration,
            fade_in,
            fade_out,
        } => {
            println!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;
            record(&cfg, &output, duration, fade_in, fade_out)?;
        }

        Commands::Devices => {
            println!("Available output devices:\n");
            if let Some(name) = engine::default_device_name() {
                println!("Default output: {}\n", name);
            }
            let devices = engine::list_output_devices();
            if devices.is_empty() {
                println!("  (none found)");
            }
            for (name, config) in devices {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!("  Channels: {}", cfg.audio.channels);
                    println!("  Volume: {:.0}%", cfg.synth.volume * 100.0);
                    println!(
                        "  Frequency: {} Hz x {}",
                        cfg.synth.base_frequency, cfg.synth.pitch
                    );
                    match &cfg.synth.clip {
                        Some(clip) => println!("  Source: clip {:?}", clip),
                        None if !cfg.synth.harmonics.is_empty() => {
                            println!("  Source: {} explicit harmonics", cfg.synth.harmonics.len())
                        }
                        None => println!("  Source: preset '{}'", cfg.synth.preset),
                    }
                    println!(
                        "  Low-pass: {}",
                        if cfg.filter.enabled { "enabled" } else { "disabled" }
                    );
                    println!(
                        "  Reverb: {} (amount {:.2}, decay {:.2})",
                        if cfg.reverb.enabled { "enabled" } else { "disabled" },
                        cfg.reverb.amount,
                        cfg.reverb.decay
                    );
                    load_library(&cfg)?;
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Presets { file } => {
            println!("Built-in presets:");
            for name in BuiltinPresets::names() {
                print_preset(name, &BuiltinPresets);
            }

            if let Some(path) = file {
                let library = PresetLibrary::load(&path)
                    .with_context(|| format!("failed to load presets from {:?}", path))?;
                println!("\nPresets in {:?}:", path);
                for name in library.names() {
                    print_preset(name, &library);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../glide.example.yaml");

            let path = "glide.yaml";
            if Path::new(path).exists() {
                println!("glide.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created glide.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

fn load_library(cfg: &GlideConfig) -> Result<PresetLibrary> {
    match &cfg.presets_file {
        Some(path) => PresetLibrary::load(path)
            .with_context(|| format!("failed to load presets from {:?}", path)),
        None => Ok(PresetLibrary::default()),
    }
}

fn print_preset(name: &str, catalog: &dyn PresetCatalog) {
    let partials: Vec<String> = catalog
        .harmonics(name)
        .iter()
        .map(|h| format!("{}:{:.2}", h.number, h.amplitude))
        .collect();
    println!("  - {:<10} {}", name, partials.join(" "));
}

fn play(cfg: &GlideConfig, duration: Option<f32>, fade: f32) -> Result<()> {
    let library = load_library(cfg)?;
    let source = engine::build_source(cfg, &library)?;
    let (mut controller, engine) = engine::channel(cfg, source);

    let mut player = Player::new();
    player.start(engine, cfg.audio.device.as_deref())?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    println!(
        "Playing at {} Hz, {} channels. Press Ctrl-C to stop.",
        player.sample_rate(),
        player.channels()
    );
    controller.play_smooth(fade);

    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if let Some(limit) = duration {
            if started.elapsed().as_secs_f32() >= limit {
                break;
            }
        }
        std::thread::sleep(TICK);
        controller.tick();
    }

    println!("Fading out...");
    controller.stop_smooth(fade);
    // The failsafe bounds this loop even if the stream stalls
    while controller.is_playing() {
        std::thread::sleep(TICK);
        controller.tick();
    }

    player.stop();
    Ok(())
}

fn record(cfg: &GlideConfig, output: &Path, duration: f32, fade_in: f32, fade_out: f32) -> Result<()> {
    let library = load_library(cfg)?;
    let source = engine::build_source(cfg, &library)?;
    let (mut controller, mut engine) = engine::channel(cfg, source);

    let sample_rate = cfg.audio.sample_rate;
    let channels = cfg.audio.channels;
    engine.prepare(sample_rate as f32, channels as usize);

    let mut recorder = Recorder::new(output, sample_rate, channels)?;
    println!("Recording {:.1} seconds to {:?}...", duration, output);

    let total_frames = (duration.max(0.0) as f64 * sample_rate as f64).round() as u64;
    let fade_out_frames = (fade_out.max(0.0) as f64 * sample_rate as f64).round() as u64;
    let fade_out_at = total_frames.saturating_sub(fade_out_frames);

    let block_frames = cfg.audio.buffer_size;
    let mut buffer = vec![0.0f32; block_frames * channels as usize];
    let mut rendered = 0u64;
    let mut next_report = 0u64;
    let mut stopping = false;

    controller.play_smooth(fade_in);
    while rendered < total_frames {
        if !stopping && rendered >= fade_out_at {
            controller.stop_smooth(fade_out);
            stopping = true;
        }

        let frames = (total_frames - rendered).min(block_frames as u64) as usize;
        let block = &mut buffer[..frames * channels as usize];
        engine.process(block, channels as usize);
        recorder.write_buffer(block)?;
        rendered += frames as u64;
        controller.tick();

        // Progress update every second
        if rendered >= next_report {
            print!(
                "\r  Progress: {}s / {:.0}s",
                rendered / sample_rate as u64,
                duration
            );
            std::io::stdout().flush()?;
            next_report += sample_rate as u64;
        }
    }

    log::debug!("Final playback state {:?}", controller.state());
    recorder.finalize()?;
    println!("\nRecorded to {:?}", output);
    Ok(())
}
