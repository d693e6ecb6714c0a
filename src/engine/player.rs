//! Real-time audio playback using cpal

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};

use super::Engine;

/// Real-time audio player.
///
/// The engine is moved into the device callback; control happens through
/// the [`Controller`](super::Controller) returned alongside it.
pub struct Player {
    stream: Option<Stream>,
    sample_rate: u32,
    channels: u16,
}

impl Player {
    pub fn new() -> Self {
        Self {
            stream: None,
            sample_rate: 0,
            channels: 0,
        }
    }

    /// Open an output device (by name, or the default) and start the engine on it
    pub fn start(&mut self, mut engine: Engine, device_name: Option<&str>) -> Result<()> {
        let device = find_device(device_name)?;
        let config = device
            .default_output_config()
            .context("failed to query output config")?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();

        self.sample_rate = stream_config.sample_rate.0;
        self.channels = stream_config.channels;
        engine.prepare(self.sample_rate as f32, self.channels as usize);
        log::info!(
            "Opened {} at {} Hz, {} channels ({:?})",
            device.name().unwrap_or_else(|_| "output device".to_string()),
            self.sample_rate,
            self.channels,
            sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, engine)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, engine)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, engine)?,
            other => return Err(anyhow!("Unsupported sample format {:?}", other)),
        };

        stream.play().context("failed to start output stream")?;
        self.stream = Some(stream);

        Ok(())
    }

    /// Close the stream
    pub fn stop(&mut self) {
        self.stream = None;
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Device sample rate, once started
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .context("failed to enumerate output devices")?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("Output device '{}' not found", name)),
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available")),
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mut engine: Engine) -> Result<Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    // Scratch space for integer formats, sized generously so the callback
    // does not normally allocate
    let mut scratch: Vec<f32> = vec![0.0; 8192 * channels.max(1)];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let block = &mut scratch[..data.len()];
            engine.process(block, channels);
            for (out, &sample) in data.iter_mut().zip(block.iter()) {
                *out = T::from_sample(sample);
            }
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}
