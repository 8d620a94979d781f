//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library).
//! Incoming audio is down-mixed to mono, cut into fixed-size frames and
//! pushed into a channel for the analysis thread.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfigRange};
use crossbeam_channel::Sender;

/// Default number of samples per analysis frame (~46 ms at 44.1 kHz).
pub const BUFFER_SIZE: usize = 2048;

/// Starts capturing from the default input device.
///
/// Frames of exactly `frame_size` mono samples are sent through `sender`.
/// Frames are dropped rather than blocking the audio callback when the
/// channel is full.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - The running stream (capture stops when it
///   is dropped) and the sample rate actually in use
/// * `Err(e)` - No device, no f32 input format, or the stream failed to start
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    frame_size: usize,
    preferred_rate: u32,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    tracing::info!("[AUDIO] Using input device: {}", device.name()?);

    let configs = device
        .supported_input_configs()
        .context("querying supported input configurations")?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, preferred_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = clamp_rate(&supported, preferred_rate);
    let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(sample_rate)).into();
    let channels = usize::from(config.channels.max(1));

    tracing::info!("[AUDIO] Capturing {} channel(s) at {} Hz", channels, sample_rate);

    let err_fn = |err| tracing::error!("[AUDIO] Stream error: {}", err);

    let mut pending = Vec::with_capacity(frame_size * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                downmix_into(data, channels, &mut pending);

                while pending.len() >= frame_size {
                    let frame: Vec<f32> = pending.drain(..frame_size).collect();
                    let _ = sender.try_send(frame);
                }
            },
            err_fn,
            None,
        )
        .context("building input stream")?;

    stream.play().context("starting input stream")?;

    Ok((stream, sample_rate))
}

/// Averages interleaved channels into mono samples appended to `out`.
fn downmix_into(data: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(data);
        return;
    }
    out.extend(
        data.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Picks an f32 configuration, preferring mono and then the range closest
/// to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = c.min_sample_rate().0.abs_diff(target_rate);
                let max_diff = c.max_sample_rate().0.abs_diff(target_rate);
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_distance)
        })
}

fn clamp_rate(config: &SupportedStreamConfigRange, target_rate: u32) -> u32 {
    target_rate.clamp(config.min_sample_rate().0, config.max_sample_rate().0)
}
