use std::sync::Mutex;

use bytes::Bytes;

use crate::audio_analyser::AudioAnalyser;

/// MockAnalyser serves a settable magnitude snapshot in place of a real
/// spectrum analyser.
#[derive(Default)]
pub struct MockAnalyser {
    magnitudes: Mutex<Option<Bytes>>,
}

impl MockAnalyser {
    /// new creates a new MockAnalyser that is still warming up.
    pub fn new() -> Self {
        MockAnalyser::default()
    }

    /// with_magnitudes creates a new MockAnalyser already producing data.
    pub fn with_magnitudes(magnitudes: Bytes) -> Self {
        MockAnalyser {
            magnitudes: Mutex::new(Some(magnitudes)),
        }
    }

    /// set_magnitudes replaces the served snapshot. None puts the analyser
    /// back into warm-up.
    pub fn set_magnitudes(&self, magnitudes: Option<Bytes>) {
        let mut current = match self.magnitudes.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = magnitudes;
    }
}

impl AudioAnalyser for MockAnalyser {
    fn frequency_magnitudes(&self) -> Option<Bytes> {
        let magnitudes = match self.magnitudes.lock() {
            Ok(magnitudes) => magnitudes,
            Err(poisoned) => poisoned.into_inner(),
        };
        magnitudes.clone()
    }
}
