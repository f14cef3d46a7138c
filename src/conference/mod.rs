pub mod transceiver_direction;

use std::sync::Arc;

use async_trait::async_trait;

use crate::conference::transceiver_direction::TransceiverDirection;
use crate::error::Result;
use crate::media_stream::media_kind::MediaKind;
use crate::media_stream::MediaStreamTrack;

/// TransceiverInit dictionary is used when asking a conference entry to
/// allocate its transceiver, to provide configuration options.
pub struct TransceiverInit {
    pub direction: TransceiverDirection,
}

/// EntryPredicateFn selects conference entries during lookup.
pub type EntryPredicateFn = Box<dyn (Fn(&dyn ConferenceEntry) -> bool) + Send + Sync>;

/// RtpSender carries the outgoing track of one conference entry.
#[async_trait]
pub trait RtpSender {
    /// track returns the outgoing track this sender currently carries.
    async fn track(&self) -> Option<Arc<dyn MediaStreamTrack + Send + Sync>>;

    /// replace_track swaps the outgoing track without requiring
    /// renegotiation. A None track stops the sender from sending.
    async fn replace_track(
        &self,
        track: Option<Arc<dyn MediaStreamTrack + Send + Sync>>,
    ) -> Result<()>;
}

/// ConferenceEntry is one negotiated media role within a conference: a media
/// kind, a direction and, once allocated, the sender that carries outgoing
/// media for it.
#[async_trait]
pub trait ConferenceEntry {
    /// kind returns the media kind this entry negotiates.
    fn kind(&self) -> MediaKind;

    /// direction returns the negotiated direction of this entry.
    fn direction(&self) -> TransceiverDirection;

    /// sender returns the sender of this entry, when one has been allocated.
    fn sender(&self) -> Option<Arc<dyn RtpSender + Send + Sync>>;

    /// create_transceiver allocates the transceiver backing this entry on
    /// its owning connection.
    async fn create_transceiver(&self, init: TransceiverInit) -> Result<()>;
}

/// Conference is the negotiation surface the stream manager reconciles its
/// outgoing tracks against. The user provides an implementation on top of
/// their signaling layer.
#[async_trait]
pub trait Conference {
    /// find_entry returns the first entry matching the predicate, in the
    /// conference's own entry order.
    async fn find_entry(
        &self,
        predicate: EntryPredicateFn,
    ) -> Option<Arc<dyn ConferenceEntry + Send + Sync>>;

    /// create_entry allocates a new entry for the given media kind.
    async fn create_entry(&self, kind: MediaKind)
        -> Result<Arc<dyn ConferenceEntry + Send + Sync>>;
}
