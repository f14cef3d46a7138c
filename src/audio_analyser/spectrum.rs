use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::audio_analyser::{
    AudioAnalyser, ANALYSER_FFT_SIZE, ANALYSER_MAX_DECIBELS, ANALYSER_MIN_DECIBELS,
    ANALYSER_SMOOTHING_TIME_CONSTANT,
};

/// SpectrumAnalyser is the built-in AudioAnalyser: a sliding window over the
/// most recent ANALYSER_FFT_SIZE samples, Hann windowed, transformed with a
/// forward FFT and smoothed over time. The audio pipeline feeds it through
/// push_samples while the sampling scheduler reads byte snapshots from it.
pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    inner: Mutex<SpectrumInner>,
}

struct SpectrumInner {
    input_buffer: Vec<f32>,
    complex_buffer: Vec<Complex<f32>>,
    /// Smoothed linear magnitudes, one per positive-frequency bin.
    smoothed: Vec<f32>,
    /// Total samples observed, saturating at ANALYSER_FFT_SIZE.
    seen: usize,
}

impl SpectrumAnalyser {
    pub fn new() -> Self {
        // Hann window to reduce spectral leakage.
        let window: Vec<f32> = (0..ANALYSER_FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (ANALYSER_FFT_SIZE - 1) as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(ANALYSER_FFT_SIZE);

        SpectrumAnalyser {
            fft,
            window,
            inner: Mutex::new(SpectrumInner {
                input_buffer: vec![0.0; ANALYSER_FFT_SIZE],
                complex_buffer: vec![Complex::new(0.0, 0.0); ANALYSER_FFT_SIZE],
                smoothed: vec![0.0; ANALYSER_FFT_SIZE / 2],
                seen: 0,
            }),
        }
    }

    /// push_samples appends time-domain samples and, once a full window has
    /// been observed, runs one analysis pass over the latest window.
    pub fn push_samples(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let inner = &mut *inner;

        // Slide the buffer left and append the newest samples.
        let n = samples.len().min(ANALYSER_FFT_SIZE);
        if n >= ANALYSER_FFT_SIZE {
            inner
                .input_buffer
                .copy_from_slice(&samples[samples.len() - ANALYSER_FFT_SIZE..]);
        } else {
            inner.input_buffer.rotate_left(n);
            let start = ANALYSER_FFT_SIZE - n;
            inner.input_buffer[start..].copy_from_slice(&samples[..n]);
        }
        inner.seen = (inner.seen + samples.len()).min(ANALYSER_FFT_SIZE);
        if inner.seen < ANALYSER_FFT_SIZE {
            return;
        }

        for i in 0..ANALYSER_FFT_SIZE {
            inner.complex_buffer[i] = Complex::new(inner.input_buffer[i] * self.window[i], 0.0);
        }
        self.fft.process(&mut inner.complex_buffer);

        for i in 0..ANALYSER_FFT_SIZE / 2 {
            let magnitude = inner.complex_buffer[i].norm() / ANALYSER_FFT_SIZE as f32;
            inner.smoothed[i] = ANALYSER_SMOOTHING_TIME_CONSTANT * inner.smoothed[i]
                + (1.0 - ANALYSER_SMOOTHING_TIME_CONSTANT) * magnitude;
        }
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        SpectrumAnalyser::new()
    }
}

impl AudioAnalyser for SpectrumAnalyser {
    fn frequency_magnitudes(&self) -> Option<Bytes> {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.seen < ANALYSER_FFT_SIZE {
            return None;
        }

        let span = ANALYSER_MAX_DECIBELS - ANALYSER_MIN_DECIBELS;
        let bytes: Vec<u8> = inner
            .smoothed
            .iter()
            .map(|&magnitude| {
                let db = if magnitude > 1e-10 {
                    20.0 * magnitude.log10()
                } else {
                    ANALYSER_MIN_DECIBELS
                };
                let scaled = (db - ANALYSER_MIN_DECIBELS) / span;
                (scaled.clamp(0.0, 1.0) * 255.0) as u8
            })
            .collect();
        Some(Bytes::from(bytes))
    }
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &ANALYSER_FFT_SIZE)
            .finish()
    }
}
