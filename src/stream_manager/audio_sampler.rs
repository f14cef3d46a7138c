use std::sync::{Arc, Weak};
use std::time::Duration;

use portable_atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::audio_analyser::AudioAnalyser;
use crate::media_stream::media_kind::MediaKind;
use crate::stream_manager::{
    AmplitudeRecord, AudioLevelsEvent, ManagerState, SampleScope, StreamManagerInternal,
    TrackDirection,
};

/// Tick counter value at which the counter wraps back to zero.
pub(crate) const TICK_COUNTER_WRAP: u32 = 1000;

/// Every third pass widens the scope from input entries to the whole
/// registry.
pub(crate) const ALL_SCOPE_STRIDE: u32 = 3;

/// Runs sampling passes at a fixed period until the close channel fires or
/// the manager is dropped. The first pass happens one full period after the
/// loop is armed.
pub(crate) async fn sampling_loop(
    internal: Weak<StreamManagerInternal>,
    period: Duration,
    mut close_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;

            _ = close_rx.recv() => {
                return;
            }
            _ = ticker.tick() => {
                let internal = match internal.upgrade() {
                    Some(internal) => internal,
                    None => return,
                };
                let event = internal.sample_pass().await;
                internal.do_audio_levels(event).await;
            }
        }
    }
}

impl StreamManagerInternal {
    /// Cancels any pending sampling loop and, while track entries remain,
    /// spawns a fresh one. The tick counter lives in the manager state, so
    /// the scope cadence carries over from the cancelled loop.
    pub(crate) async fn rearm_sampler(self: &Arc<Self>, state: &ManagerState) {
        let period = match self.config.sampling_interval {
            Some(period) => period,
            None => return,
        };

        let mut sampler_close_tx = self.sampler_close_tx.lock().await;
        sampler_close_tx.take();

        if state.entries.is_empty() || self.is_closed.load(Ordering::SeqCst) {
            return;
        }

        let (close_tx, close_rx) = mpsc::channel(1);
        *sampler_close_tx = Some(close_tx);

        let mut w = {
            let wait_group = self.sampler_wg.lock().await;
            wait_group.as_ref().map(|wg| wg.worker())
        };
        let internal = Arc::downgrade(self);
        tokio::spawn(async move {
            let _d = w.take();
            sampling_loop(internal, period, close_rx).await;
        });
    }

    /// Runs one sampling pass under the state lock and returns the event to
    /// dispatch once the lock is released.
    pub(crate) async fn sample_pass(&self) -> AudioLevelsEvent {
        let mut state = self.state.lock().await;

        let scope = if state.tick % ALL_SCOPE_STRIDE == 0 {
            SampleScope::All
        } else {
            SampleScope::Input
        };
        state.tick += 1;
        if state.tick >= TICK_COUNTER_WRAP {
            state.tick = 0;
        }

        let amplitudes: Vec<AmplitudeRecord> = state
            .entries
            .iter()
            .filter(|entry| entry.kind == MediaKind::Audio)
            .filter(|entry| scope == SampleScope::All || entry.direction == TrackDirection::Input)
            .take(self.config.max_sampled_entries)
            .filter_map(|entry| {
                // Entries whose analyser is still warming up consume a slot
                // but produce no record.
                let magnitudes = entry.analyser.as_ref()?.frequency_magnitudes()?;
                Some(AmplitudeRecord {
                    direction: entry.direction,
                    source_id: entry.source_id.clone(),
                    stream: Arc::clone(&entry.stream),
                    track: Arc::clone(&entry.track),
                    value: (self.amplitude_fn)(&magnitudes),
                })
            })
            .collect();

        AudioLevelsEvent { amplitudes, scope }
    }

    pub(crate) async fn do_audio_levels(&self, event: AudioLevelsEvent) {
        if let Some(handler) = &*self.handlers.on_audio_levels.load() {
            let mut f = handler.lock().await;
            f(event).await;
        } else {
            log::trace!("no on_audio_levels handler for sampling pass");
        }
    }
}
