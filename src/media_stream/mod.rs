pub mod media_kind;

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::media_stream::media_kind::MediaKind;

/// OnTrackEndedHdlrFn is the handler function type fired once when a track
/// reaches the end of its media.
pub type OnTrackEndedHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// TrackEndedSubscription detaches a registered track-ended callback without
/// firing it. cancel must tolerate repeated calls, including after the
/// callback has already fired.
pub trait TrackEndedSubscription {
    fn cancel(&self);
}

/// MediaStreamTrack is a single piece of media produced or consumed by the
/// application pipeline. The user provides their own implementations on top
/// of capture devices or decoded remote media.
/// <https://www.w3.org/TR/mediacapture-streams/#mediastreamtrack>
pub trait MediaStreamTrack {
    /// id returns the stable unique identifier of this track.
    fn id(&self) -> &str;

    /// kind returns whether this track carries audio or video.
    fn kind(&self) -> MediaKind;

    /// on_ended registers a one-shot handler fired when the track terminates.
    fn on_ended(&self, f: OnTrackEndedHdlrFn) -> Box<dyn TrackEndedSubscription + Send + Sync>;

    fn as_any(&self) -> &dyn Any;
}

/// MediaStream is a grouping of tracks rendered or captured together.
/// <https://www.w3.org/TR/mediacapture-streams/#mediastream>
#[async_trait]
pub trait MediaStream {
    /// id returns the raw identifier of this stream.
    fn id(&self) -> &str;

    /// source_label returns a human readable description of the media
    /// source, when the underlying pipeline provides one.
    fn source_label(&self) -> Option<&str>;

    /// add_track attaches a track to this stream. Adding a track that is
    /// already present is a no-op.
    async fn add_track(&self, track: Arc<dyn MediaStreamTrack + Send + Sync>);

    /// remove_track detaches a track from this stream. Removing an absent
    /// track is a no-op.
    async fn remove_track(&self, track: &Arc<dyn MediaStreamTrack + Send + Sync>);

    /// get_tracks returns the attached tracks in insertion order.
    async fn get_tracks(&self) -> Vec<Arc<dyn MediaStreamTrack + Send + Sync>>;
}
