
pub mod spectrum;

use std::sync::Arc;

use bytes::Bytes;

use crate::media_stream::MediaStreamTrack;

/// Number of time-domain samples consumed by one analysis pass. Magnitude
/// snapshots carry ANALYSER_FFT_SIZE / 2 frequency bins.
pub const ANALYSER_FFT_SIZE: usize = 1024;

/// Decibel value mapped to byte 0 in a magnitude snapshot.
pub const ANALYSER_MIN_DECIBELS: f32 = -100.0;

/// Decibel value mapped to byte 255 in a magnitude snapshot.
pub const ANALYSER_MAX_DECIBELS: f32 = -30.0;

/// Weight of the previous analysis pass when smoothing magnitudes over time.
/// Kept low so the sampled levels track the live signal closely.
pub const ANALYSER_SMOOTHING_TIME_CONSTANT: f32 = 0.05;

/// AudioAnalyser exposes the most recent frequency-domain snapshot of an
/// audio track, one byte per bin scaled across
/// [ANALYSER_MIN_DECIBELS, ANALYSER_MAX_DECIBELS].
pub trait AudioAnalyser {
    /// frequency_magnitudes returns the latest per-bin magnitudes, or None
    /// while the analyser has not yet observed a full analysis window.
    fn frequency_magnitudes(&self) -> Option<Bytes>;
}

impl<A: AudioAnalyser + ?Sized> AudioAnalyser for Arc<A> {
    fn frequency_magnitudes(&self) -> Option<Bytes> {
        self.as_ref().frequency_magnitudes()
    }
}

/// AnalyserFactoryFn builds the analyser attached to a newly registered
/// audio track. The application keeps feeding the analyser from its own
/// pipeline; the manager only reads snapshots from it.
pub type AnalyserFactoryFn = Box<
    dyn (Fn(&Arc<dyn MediaStreamTrack + Send + Sync>) -> Box<dyn AudioAnalyser + Send + Sync>)
        + Send
        + Sync,
>;

/// AmplitudeFn reduces one magnitude snapshot to a single level value.
pub type AmplitudeFn = Box<dyn (Fn(&[u8]) -> f32) + Send + Sync>;

/// average_magnitude is the default amplitude reduction: the arithmetic mean
/// over all frequency bins. Returns 0.0 for an empty snapshot.
pub fn average_magnitude(magnitudes: &[u8]) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let sum: u32 = magnitudes.iter().map(|&m| m as u32).sum();
    sum as f32 / magnitudes.len() as f32
}
