//! Background music playback.
//!
//! One cpal output stream runs for the whole session. The audio callback
//! and the main thread share a single `MusicState` behind a mutex: the
//! callback copies samples out and advances the gain ramp; the main thread
//! only ever swaps tracks and retargets the gain.
//!
//! Switching tracks starts a fade-out on the current track and spawns a
//! detached thread that sleeps through the fade, then decodes the next
//! file and installs it with a fade-in. The thread holds only a weak
//! reference to the shared state, so if the player is dropped meanwhile
//! the pending start silently evaporates. The deferred action touches no
//! gameplay state; its only ordering guarantee is that the new track
//! becomes audible after the fade.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

pub const FADE_SECONDS: f32 = 1.2;

struct Track {
    /// Interleaved at the output channel count and sample rate.
    samples: Vec<f32>,
}

#[derive(Default)]
struct MusicState {
    track: Option<Track>,
    cursor: usize,
    gain: f32,
    gain_target: f32,
    /// Gain change per output frame.
    gain_step: f32,
}

impl MusicState {
    fn retarget_gain(&mut self, target: f32, seconds: f32, sample_rate: u32) {
        self.gain_target = target;
        let frames = (seconds * sample_rate as f32).max(1.0);
        self.gain_step = (target - self.gain).abs() / frames;
    }

    /// Fill an interleaved output buffer, looping the track and walking the
    /// gain toward its target one step per frame.
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        let Some(track) = &self.track else {
            data.fill(0.0);
            return;
        };
        if track.samples.is_empty() {
            data.fill(0.0);
            return;
        }

        for frame in data.chunks_mut(channels) {
            for sample in frame.iter_mut() {
                *sample = track.samples[self.cursor] * self.gain;
                self.cursor = (self.cursor + 1) % track.samples.len();
            }
            if self.gain < self.gain_target {
                self.gain = (self.gain + self.gain_step).min(self.gain_target);
            } else if self.gain > self.gain_target {
                self.gain = (self.gain - self.gain_step).max(self.gain_target);
            }
        }
    }
}

pub struct MusicPlayer {
    state: Arc<Mutex<MusicState>>,
    _stream: Option<cpal::Stream>,
    sample_rate: u32,
    channels: u16,
    current: Option<PathBuf>,
}

impl MusicPlayer {
    /// Open the default output device. A machine without one degrades to a
    /// silent player rather than failing the game.
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(MusicState::default()));
        match open_stream(Arc::clone(&state)) {
            Some((stream, sample_rate, channels)) => Self {
                state,
                _stream: Some(stream),
                sample_rate,
                channels,
                current: None,
            },
            None => {
                log::warn!("No audio output device, music disabled");
                Self {
                    state,
                    _stream: None,
                    sample_rate: 44_100,
                    channels: 2,
                    current: None,
                }
            }
        }
    }

    /// Human-readable label for the overlay.
    pub fn current_label(&self) -> String {
        match &self.current {
            Some(path) => format!(
                "Music: {}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            ),
            None => "Music: (silence)".to_string(),
        }
    }

    /// Fade the current track out and, if a new track is given, start it
    /// after the fade has run its course. Switching to the already-playing
    /// track is a no-op.
    pub fn switch_to(&mut self, next: Option<PathBuf>) {
        if self.current == next {
            return;
        }
        log::info!(
            "Music switching to {}",
            next.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(silence)".to_string())
        );
        self.current = next.clone();

        if let Ok(mut state) = self.state.lock() {
            state.retarget_gain(0.0, FADE_SECONDS, self.sample_rate);
        }

        let Some(path) = next else {
            return;
        };
        let weak: Weak<Mutex<MusicState>> = Arc::downgrade(&self.state);
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f32(FADE_SECONDS));
            // Player gone: the pending start aborts without a trace.
            let Some(state) = weak.upgrade() else {
                return;
            };
            match load_track(&path, sample_rate, channels) {
                Ok(track) => {
                    if let Ok(mut state) = state.lock() {
                        state.track = Some(track);
                        state.cursor = 0;
                        state.gain = 0.0;
                        state.retarget_gain(1.0, FADE_SECONDS, sample_rate);
                    }
                }
                Err(err) => log::warn!("Failed to start track {}: {err}", path.display()),
            }
        });
    }
}

fn open_stream(state: Arc<Mutex<MusicState>>) -> Option<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    let default_config = device.default_output_config().ok()?;
    let sample_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                match state.lock() {
                    Ok(mut state) => state.fill(data, channels as usize),
                    Err(_) => data.fill(0.0),
                }
            },
            |err| log::error!("Audio stream error: {err}"),
            None,
        )
        .ok()?;
    stream.play().ok()?;
    log::info!("Audio stream open at {sample_rate} Hz, {channels} channels");
    Some((stream, sample_rate, channels))
}

/// Decode a WAV file and convert it to the output layout: interleaved
/// frames at `out_channels`, linearly resampled to `out_rate`.
fn load_track(path: &std::path::Path, out_rate: u32, out_channels: u16) -> Result<Track, String> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| format!("Failed to open {}: {e}", path.display()))?;
    let spec = reader.spec();

    let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (hound::SampleFormat::Int, bits) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?
        }
        (format, bits) => {
            return Err(format!(
                "Unsupported WAV format {format:?}/{bits} bits in {}",
                path.display()
            ))
        }
    };

    let src_channels = spec.channels.max(1) as usize;
    let src_frames = raw.len() / src_channels;
    if src_frames == 0 {
        return Err(format!("{} contains no audio frames", path.display()));
    }

    let out_channels = out_channels.max(1) as usize;
    let out_frames =
        ((src_frames as u64 * out_rate as u64) / spec.sample_rate.max(1) as u64) as usize;
    let mut samples = Vec::with_capacity(out_frames * out_channels);

    for out_frame in 0..out_frames {
        // Linear interpolation between neighboring source frames.
        let src_pos = out_frame as f64 * spec.sample_rate as f64 / out_rate as f64;
        let base = (src_pos as usize).min(src_frames - 1);
        let next = (base + 1).min(src_frames - 1);
        let t = (src_pos - base as f64) as f32;
        for channel in 0..out_channels {
            let src_channel = channel.min(src_channels - 1);
            let a = raw[base * src_channels + src_channel];
            let b = raw[next * src_channels + src_channel];
            samples.push(a + (b - a) * t);
        }
    }

    Ok(Track { samples })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_wav_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "ih_audio_test_{}_{}_{}.wav",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn write_mono_wav(path: &PathBuf, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for &sample in samples {
            writer.write_sample(sample).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn mono_wav_expands_to_stereo_frames() {
        let path = temp_wav_path("mono");
        write_mono_wav(&path, 44_100, &[i16::MAX, 0, i16::MIN / 2, 0]);

        let track = load_track(&path, 44_100, 2).expect("track loads");
        assert_eq!(track.samples.len(), 8, "4 frames x 2 channels");
        assert_eq!(track.samples[0], track.samples[1], "mono copied to both");
        assert!((track.samples[0] - 1.0).abs() < 1e-3);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn resampling_scales_the_frame_count() {
        let path = temp_wav_path("resample");
        write_mono_wav(&path, 22_050, &vec![1000i16; 2205]);

        let track = load_track(&path, 44_100, 2).expect("track loads");
        // 0.1 s of audio at the doubled rate, stereo interleaved.
        assert_eq!(track.samples.len(), 4410 * 2);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_error_not_a_panic() {
        let path = temp_wav_path("missing");
        assert!(load_track(&path, 44_100, 2).is_err());
    }

    #[test]
    fn fill_applies_and_ramps_gain() {
        let mut state = MusicState {
            track: Some(Track {
                samples: vec![1.0; 64],
            }),
            cursor: 0,
            gain: 0.0,
            gain_target: 0.0,
            gain_step: 0.0,
        };
        // Fade in over 8 frames.
        state.gain_target = 1.0;
        state.gain_step = 1.0 / 8.0;

        let mut buffer = vec![0.0f32; 32];
        state.fill(&mut buffer, 2);

        assert_eq!(buffer[0], 0.0, "first frame still at zero gain");
        assert!(buffer[16] > buffer[2], "gain rises across the buffer");
        assert_eq!(buffer[30], 1.0, "ramp saturates at the target");
        assert_eq!(state.gain, 1.0);
    }

    #[test]
    fn fill_without_a_track_is_silence() {
        let mut state = MusicState::default();
        let mut buffer = vec![0.5f32; 16];
        state.fill(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn fill_loops_the_track() {
        let mut state = MusicState {
            track: Some(Track {
                samples: vec![0.25; 6],
            }),
            cursor: 0,
            gain: 1.0,
            gain_target: 1.0,
            gain_step: 0.0,
        };
        let mut buffer = vec![0.0f32; 16];
        state.fill(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.25));
        assert_eq!(state.cursor, 16 % 6);
    }

    #[test]
    fn retarget_gain_computes_a_positive_step() {
        let mut state = MusicState {
            gain: 1.0,
            ..MusicState::default()
        };
        state.retarget_gain(0.0, 1.0, 48_000);
        assert_eq!(state.gain_target, 0.0);
        assert!((state.gain_step - 1.0 / 48_000.0).abs() < 1e-9);
    }
}
