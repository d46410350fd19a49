//! Immutable description of one streaming run.

use std::path::PathBuf;

/// Fixed encode parameter set for the external encoder.
///
/// The profile favors low CPU use and low latency: constant bitrate ceiling,
/// buffer at twice the bitrate, fixed keyframe interval, scene-change
/// detection off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    /// Video bitrate ceiling in kbit/s.
    pub video_bitrate_kbps: u32,
    /// Keyframe interval in frames.
    pub keyframe_interval: u32,
    /// Audio bitrate in kbit/s.
    pub audio_bitrate_kbps: u32,
    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,
    /// Audio channel count.
    pub audio_channels: u32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        // 360p-friendly profile: 800 kbit/s video, 2 s GOP at 30 fps,
        // stereo AAC at 128 kbit/s.
        Self {
            video_bitrate_kbps: 800,
            keyframe_interval: 60,
            audio_bitrate_kbps: 128,
            audio_sample_rate: 44_100,
            audio_channels: 2,
        }
    }
}

impl EncodeParams {
    /// Encoder buffer size in kbit, always twice the video bitrate.
    pub fn buffer_size_kbit(&self) -> u32 {
        self.video_bitrate_kbps * 2
    }
}

/// Immutable configuration for one streaming run.
///
/// Created once before the loop starts and shared by every attempt, so retry
/// parameters cannot drift across restarts.
#[derive(Debug, Clone)]
pub struct StreamJob {
    /// Local path of the source media file.
    pub local_path: PathBuf,
    /// Ingest URL, including the stream key.
    pub ingest_url: String,
    /// Encode parameters passed to every encoder invocation.
    pub encode: EncodeParams,
}

impl StreamJob {
    /// Create a job with the default encode profile.
    pub fn new(local_path: impl Into<PathBuf>, ingest_url: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            ingest_url: ingest_url.into(),
            encode: EncodeParams::default(),
        }
    }

    /// Override the encode parameter set.
    pub fn with_encode(mut self, encode: EncodeParams) -> Self {
        self.encode = encode;
        self
    }
}
