#[cfg(test)]
mod audio_sampler_test;

pub(crate) mod audio_sampler;
pub(crate) mod source_id;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use portable_atomic::{AtomicBool, Ordering};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio::sync::{mpsc, Mutex};
use waitgroup::WaitGroup;

use crate::audio_analyser::{average_magnitude, AmplitudeFn, AnalyserFactoryFn, AudioAnalyser};
use crate::conference::transceiver_direction::TransceiverDirection;
use crate::conference::{Conference, ConferenceEntry, TransceiverInit};
use crate::error::{Error, Result};
use crate::media_stream::media_kind::MediaKind;
use crate::media_stream::{MediaStream, MediaStreamTrack, TrackEndedSubscription};

/// Default cap on the number of entries sampled in one scheduler tick.
pub const DEFAULT_MAX_SAMPLED_ENTRIES: usize = 4;

/// TrackDirection indicates whether a registered track is captured locally
/// and sent into the call, or received from a remote participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackDirection {
    /// Input indicates a locally captured track.
    #[serde(rename = "input")]
    Input,

    /// Output indicates a track received from a remote participant.
    #[serde(rename = "output")]
    Output,
}

const TRACK_DIRECTION_INPUT_STR: &str = "input";
const TRACK_DIRECTION_OUTPUT_STR: &str = "output";

impl fmt::Display for TrackDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TrackDirection::Input => TRACK_DIRECTION_INPUT_STR,
            TrackDirection::Output => TRACK_DIRECTION_OUTPUT_STR,
        };
        write!(f, "{s}")
    }
}

/// SampleScope indicates which slice of the registry one scheduler tick
/// covered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleScope {
    /// All covers input and output entries alike.
    #[serde(rename = "all")]
    All,

    /// Input covers locally captured entries only.
    #[serde(rename = "input")]
    Input,
}

const SAMPLE_SCOPE_ALL_STR: &str = "all";
const SAMPLE_SCOPE_INPUT_STR: &str = "input";

impl fmt::Display for SampleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SampleScope::All => SAMPLE_SCOPE_ALL_STR,
            SampleScope::Input => SAMPLE_SCOPE_INPUT_STR,
        };
        write!(f, "{s}")
    }
}

/// AmplitudeRecord is one sampled audio level.
#[derive(Clone)]
pub struct AmplitudeRecord {
    pub direction: TrackDirection,
    pub source_id: SmolStr,
    pub stream: Arc<dyn MediaStream + Send + Sync>,
    pub track: Arc<dyn MediaStreamTrack + Send + Sync>,
    pub value: f32,
}

impl fmt::Debug for AmplitudeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmplitudeRecord")
            .field("direction", &self.direction)
            .field("source_id", &self.source_id)
            .field("track_id", &self.track.id())
            .field("value", &self.value)
            .finish()
    }
}

/// AudioLevelsEvent is one scheduler notification: every level sampled in a
/// tick plus the scope the tick covered.
#[derive(Debug, Clone)]
pub struct AudioLevelsEvent {
    pub amplitudes: Vec<AmplitudeRecord>,
    pub scope: SampleScope,
}

/// OnAudioLevelsHdlrFn is the handler function type for scheduler
/// notifications.
pub type OnAudioLevelsHdlrFn = Box<
    dyn (FnMut(AudioLevelsEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// RemoteSourceFn maps the numeric suffix of a remote stream id to the
/// stable source identifier announced by the negotiation layer.
pub type RemoteSourceFn = Box<dyn (Fn(u64) -> SmolStr) + Send + Sync>;

/// StreamManagerConfig collects the scheduler parameters of a StreamManager.
#[derive(Clone)]
pub struct StreamManagerConfig {
    /// Sampling period. The scheduler never runs when unset.
    pub sampling_interval: Option<Duration>,

    /// Cap on the number of entries sampled in one tick.
    pub max_sampled_entries: usize,
}

impl Default for StreamManagerConfig {
    fn default() -> Self {
        StreamManagerConfig {
            sampling_interval: None,
            max_sampled_entries: DEFAULT_MAX_SAMPLED_ENTRIES,
        }
    }
}

struct TrackEntry {
    direction: TrackDirection,
    kind: MediaKind,
    source_id: SmolStr,
    stream: Arc<dyn MediaStream + Send + Sync>,
    track: Arc<dyn MediaStreamTrack + Send + Sync>,
    /// Present only for audio entries, and only when an analyser factory is
    /// configured.
    analyser: Option<Box<dyn AudioAnalyser + Send + Sync>>,
    ended_subscription: Box<dyn TrackEndedSubscription + Send + Sync>,
}

impl Drop for TrackEntry {
    fn drop(&mut self) {
        self.ended_subscription.cancel();
    }
}

#[derive(Default)]
struct ManagerState {
    /// Registered entries in registration order.
    entries: Vec<TrackEntry>,
    /// The canonical input stream, adopted on the first input registration.
    input_stream: Option<Arc<dyn MediaStream + Send + Sync>>,
    /// Scheduler tick counter. Survives timer recreation.
    tick: u32,
}

#[derive(Default)]
struct Handlers {
    on_audio_levels: ArcSwapOption<Mutex<OnAudioLevelsHdlrFn>>,
}

pub(crate) struct StreamManagerInternal {
    config: StreamManagerConfig,
    output_stream: Arc<dyn MediaStream + Send + Sync>,
    remote_source_fn: RemoteSourceFn,
    amplitude_fn: AmplitudeFn,
    analyser_factory: Option<AnalyserFactoryFn>,

    state: Mutex<ManagerState>,
    sampler_close_tx: Mutex<Option<mpsc::Sender<()>>>,
    sampler_wg: Mutex<Option<WaitGroup>>,
    is_closed: AtomicBool,
    handlers: Handlers,
}

impl StreamManagerInternal {
    async fn add_stream(
        self: &Arc<Self>,
        stream: Arc<dyn MediaStream + Send + Sync>,
        direction: TrackDirection,
    ) {
        for track in stream.get_tracks().await {
            self.add_track(Arc::clone(&stream), track, direction).await;
        }
    }

    async fn add_track(
        self: &Arc<Self>,
        stream: Arc<dyn MediaStream + Send + Sync>,
        track: Arc<dyn MediaStreamTrack + Send + Sync>,
        direction: TrackDirection,
    ) {
        if self.is_closed.load(Ordering::SeqCst) {
            log::trace!("add_track after close, ignoring track {}", track.id());
            return;
        }

        let kind = track.kind();
        let source_id = match direction {
            TrackDirection::Input => source_id::local_source_id(stream.as_ref()),
            TrackDirection::Output => {
                source_id::remote_source_id(stream.as_ref(), &self.remote_source_fn)
            }
        };

        let mut state = self.state.lock().await;
        let mut audio_changed = kind == MediaKind::Audio;

        match direction {
            TrackDirection::Input => {
                if let Some(input) = &state.input_stream {
                    // Only audio is folded into the input aggregate; video
                    // input stays registry-only and is rendered externally.
                    if kind == MediaKind::Audio {
                        input.add_track(Arc::clone(&track)).await;
                    }
                } else {
                    state.input_stream = Some(Arc::clone(&stream));
                }
            }
            TrackDirection::Output => {
                // A confirmed remote track supersedes the locally previewed
                // input entry of the same source.
                if let Some(pos) = state
                    .entries
                    .iter()
                    .position(|e| e.direction == TrackDirection::Input && e.source_id == source_id)
                {
                    let evicted = state.entries.remove(pos);
                    log::debug!(
                        "evicting input track {} superseded by output for source {}",
                        evicted.track.id(),
                        evicted.source_id
                    );
                    if let Some(input) = state.input_stream.clone() {
                        input.remove_track(&evicted.track).await;
                    }
                    audio_changed |= evicted.kind == MediaKind::Audio;
                }

                if kind != MediaKind::Video {
                    self.output_stream.add_track(Arc::clone(&track)).await;
                }
            }
        }

        let analyser = if kind == MediaKind::Audio {
            self.analyser_factory.as_ref().map(|factory| factory(&track))
        } else {
            None
        };

        let ended_subscription = {
            let internal = Arc::downgrade(self);
            let ended_track = Arc::clone(&track);
            track.on_ended(Box::new(move || {
                let internal = internal.clone();
                let track = Arc::clone(&ended_track);
                Box::pin(async move {
                    if let Some(internal) = internal.upgrade() {
                        internal.remove_track(&track).await;
                    }
                })
            }))
        };

        log::trace!(
            "registering {} {} track {} for source {}",
            direction,
            kind,
            track.id(),
            source_id
        );
        state.entries.push(TrackEntry {
            direction,
            kind,
            source_id,
            stream,
            track,
            analyser,
            ended_subscription,
        });

        if audio_changed {
            self.rearm_sampler(&state).await;
        }
    }

    async fn remove_track(self: &Arc<Self>, track: &Arc<dyn MediaStreamTrack + Send + Sync>) {
        if self.is_closed.load(Ordering::SeqCst) {
            return;
        }

        let mut state = self.state.lock().await;
        let pos = match state
            .entries
            .iter()
            .position(|e| e.track.id() == track.id())
        {
            Some(pos) => pos,
            None => {
                log::trace!("remove_track for unknown track {}, ignoring", track.id());
                return;
            }
        };

        let entry = state.entries.remove(pos);
        match entry.direction {
            TrackDirection::Output => {
                self.output_stream.remove_track(&entry.track).await;
            }
            TrackDirection::Input => {
                if let Some(input) = state.input_stream.clone() {
                    input.remove_track(&entry.track).await;
                }
            }
        }

        let audio_changed = entry.kind == MediaKind::Audio;
        drop(entry);

        if audio_changed {
            self.rearm_sampler(&state).await;
        }
    }

    async fn replace_input_audio(
        self: &Arc<Self>,
        new_stream: Arc<dyn MediaStream + Send + Sync>,
        old_track: &Arc<dyn MediaStreamTrack + Send + Sync>,
    ) {
        self.remove_track(old_track).await;
        self.add_stream(new_stream, TrackDirection::Input).await;
    }

    async fn append_to_conference(
        self: &Arc<Self>,
        conference: &Arc<dyn Conference + Send + Sync>,
    ) -> Result<()> {
        if self.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrStreamManagerClosed);
        }

        let input_stream = {
            let state = self.state.lock().await;
            state.input_stream.clone()
        };

        for kind in [MediaKind::Audio, MediaKind::Video] {
            if let Err(err) = self
                .reconcile_send_entry(conference, &input_stream, kind)
                .await
            {
                log::warn!("failed to reconcile {} send entry: {}", kind, err);
            }
        }

        Ok(())
    }

    async fn reconcile_send_entry(
        &self,
        conference: &Arc<dyn Conference + Send + Sync>,
        input_stream: &Option<Arc<dyn MediaStream + Send + Sync>>,
        kind: MediaKind,
    ) -> Result<()> {
        let entry = match conference
            .find_entry(Box::new(move |entry: &dyn ConferenceEntry| {
                entry.kind() == kind && entry.direction() == TransceiverDirection::Sendonly
            }))
            .await
        {
            Some(entry) => entry,
            None => {
                let entry = conference.create_entry(kind).await?;
                entry
                    .create_transceiver(TransceiverInit {
                        direction: TransceiverDirection::Sendonly,
                    })
                    .await?;
                entry
            }
        };

        let desired = match input_stream {
            Some(stream) => stream
                .get_tracks()
                .await
                .into_iter()
                .find(|track| track.kind() == kind),
            None => None,
        };

        let sender = entry.sender().ok_or(Error::ErrConferenceEntryNoSender)?;
        let current = sender.track().await;
        let unchanged = match (&current, &desired) {
            (None, None) => true,
            (Some(current), Some(desired)) => current.id() == desired.id(),
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        // Replacement is detached; the negotiation step driving this call
        // must not wait on it.
        tokio::spawn(async move {
            if let Err(err) = sender.replace_track(desired).await {
                log::warn!("failed to replace outgoing {} track: {}", kind, err);
            }
        });

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        {
            let mut close_tx = self.sampler_close_tx.lock().await;
            close_tx.take();
        }

        {
            let mut wait_group = self.sampler_wg.lock().await;
            if let Some(wg) = wait_group.take() {
                wg.wait().await;
            }
        }

        let mut state = self.state.lock().await;
        let input_stream = state.input_stream.take();
        let entries = std::mem::take(&mut state.entries);
        for entry in &entries {
            match entry.direction {
                TrackDirection::Output => {
                    self.output_stream.remove_track(&entry.track).await;
                }
                TrackDirection::Input => {
                    if let Some(input) = &input_stream {
                        input.remove_track(&entry.track).await;
                    }
                }
            }
        }

        Ok(())
    }
}

/// StreamManagerBuilder can be used to configure a StreamManager.
#[derive(Default)]
pub struct StreamManagerBuilder {
    config: StreamManagerConfig,
    remote_source_fn: Option<RemoteSourceFn>,
    amplitude_fn: Option<AmplitudeFn>,
    analyser_factory: Option<AnalyserFactoryFn>,
}

impl StreamManagerBuilder {
    /// with_sampling_interval sets the scheduler period. Without it the
    /// scheduler never runs.
    pub fn with_sampling_interval(mut self, interval: Duration) -> StreamManagerBuilder {
        self.config.sampling_interval = Some(interval);
        self
    }

    /// with_max_sampled_entries bounds how many entries one tick samples.
    pub fn with_max_sampled_entries(mut self, max_sampled_entries: usize) -> StreamManagerBuilder {
        self.config.max_sampled_entries = max_sampled_entries;
        self
    }

    /// with_remote_source_fn sets the mapping from the numeric suffix of a
    /// remote stream id to its source identifier.
    pub fn with_remote_source_fn(mut self, remote_source_fn: RemoteSourceFn) -> StreamManagerBuilder {
        self.remote_source_fn = Some(remote_source_fn);
        self
    }

    /// with_amplitude_fn replaces the default average magnitude reduction.
    pub fn with_amplitude_fn(mut self, amplitude_fn: AmplitudeFn) -> StreamManagerBuilder {
        self.amplitude_fn = Some(amplitude_fn);
        self
    }

    /// with_analyser_factory attaches an analyser to every registered audio
    /// track. Without a factory the scheduler emits no levels.
    pub fn with_analyser_factory(mut self, analyser_factory: AnalyserFactoryFn) -> StreamManagerBuilder {
        self.analyser_factory = Some(analyser_factory);
        self
    }

    /// build assembles a StreamManager around the output aggregate stream
    /// that remote tracks are mixed into.
    pub fn build(self, output_stream: Arc<dyn MediaStream + Send + Sync>) -> StreamManager {
        StreamManager {
            internal: Arc::new(StreamManagerInternal {
                config: self.config,
                output_stream,
                remote_source_fn: self
                    .remote_source_fn
                    .unwrap_or_else(|| Box::new(|numeric| SmolStr::new(numeric.to_string()))),
                amplitude_fn: self
                    .amplitude_fn
                    .unwrap_or_else(|| Box::new(average_magnitude)),
                analyser_factory: self.analyser_factory,
                state: Mutex::new(ManagerState::default()),
                sampler_close_tx: Mutex::new(None),
                sampler_wg: Mutex::new(Some(WaitGroup::new())),
                is_closed: AtomicBool::new(false),
                handlers: Handlers::default(),
            }),
        }
    }
}

/// StreamManager tracks the set of live media tracks in a group call: which
/// are captured locally and sent, which are received from remote
/// participants, the aggregate streams grouping them, and how loud each
/// audio track currently is.
pub struct StreamManager {
    internal: Arc<StreamManagerInternal>,
}

impl StreamManager {
    /// builder returns a new StreamManagerBuilder.
    pub fn builder() -> StreamManagerBuilder {
        StreamManagerBuilder::default()
    }

    /// new creates a StreamManager with the given configuration and default
    /// collaborators.
    pub fn new(
        config: StreamManagerConfig,
        output_stream: Arc<dyn MediaStream + Send + Sync>,
    ) -> StreamManager {
        let mut builder = StreamManager::builder().with_max_sampled_entries(config.max_sampled_entries);
        if let Some(interval) = config.sampling_interval {
            builder = builder.with_sampling_interval(interval);
        }
        builder.build(output_stream)
    }

    /// add_stream registers every track of the stream under the given
    /// direction.
    pub async fn add_stream(
        &self,
        stream: Arc<dyn MediaStream + Send + Sync>,
        direction: TrackDirection,
    ) {
        self.internal.add_stream(stream, direction).await;
    }

    /// add_track registers a single track of the stream under the given
    /// direction.
    pub async fn add_track(
        &self,
        stream: Arc<dyn MediaStream + Send + Sync>,
        track: Arc<dyn MediaStreamTrack + Send + Sync>,
        direction: TrackDirection,
    ) {
        self.internal.add_track(stream, track, direction).await;
    }

    /// remove_track removes the first registered entry carrying this track.
    /// Removing an unknown track is a no-op.
    pub async fn remove_track(&self, track: &Arc<dyn MediaStreamTrack + Send + Sync>) {
        self.internal.remove_track(track).await;
    }

    /// replace_input_audio removes the entry of the old capture track, then
    /// registers every track of the replacement stream as input.
    pub async fn replace_input_audio(
        &self,
        new_stream: Arc<dyn MediaStream + Send + Sync>,
        old_track: &Arc<dyn MediaStreamTrack + Send + Sync>,
    ) {
        self.internal
            .replace_input_audio(new_stream, old_track)
            .await;
    }

    /// append_to_conference reconciles the audio and video send roles of the
    /// conference with the current input tracks. Reconcile failures are
    /// logged rather than returned; the only error is use after close.
    pub async fn append_to_conference(
        &self,
        conference: &Arc<dyn Conference + Send + Sync>,
    ) -> Result<()> {
        self.internal.append_to_conference(conference).await
    }

    /// input_stream returns the canonical input stream, once one has been
    /// adopted.
    pub async fn input_stream(&self) -> Option<Arc<dyn MediaStream + Send + Sync>> {
        let state = self.internal.state.lock().await;
        state.input_stream.clone()
    }

    /// output_stream returns the output aggregate stream remote tracks are
    /// mixed into.
    pub fn output_stream(&self) -> Arc<dyn MediaStream + Send + Sync> {
        Arc::clone(&self.internal.output_stream)
    }

    /// on_audio_levels sets the handler for scheduler notifications,
    /// replacing any previous handler.
    pub fn on_audio_levels(&self, f: OnAudioLevelsHdlrFn) {
        self.internal
            .handlers
            .on_audio_levels
            .store(Some(Arc::new(Mutex::new(f))));
    }

    /// close stops the sampling scheduler, waits for it to drain, and tears
    /// down every registered entry. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.internal.close().await
    }
}
