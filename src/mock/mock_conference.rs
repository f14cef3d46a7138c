use std::sync::Arc;

use async_trait::async_trait;
use portable_atomic::{AtomicU64, AtomicU8, Ordering};
use tokio::sync::{mpsc, Mutex};

use crate::conference::transceiver_direction::TransceiverDirection;
use crate::conference::{Conference, ConferenceEntry, EntryPredicateFn, RtpSender, TransceiverInit};
use crate::error::{Error, Result};
use crate::media_stream::media_kind::MediaKind;
use crate::media_stream::MediaStreamTrack;

/// MockRtpSender records replace_track calls against a settable current
/// track.
pub struct MockRtpSender {
    track: Mutex<Option<Arc<dyn MediaStreamTrack + Send + Sync>>>,
    replace_track_err: Mutex<Option<Error>>,

    replace_calls_tx: mpsc::Sender<Option<Arc<dyn MediaStreamTrack + Send + Sync>>>,
    replace_calls_rx: Mutex<mpsc::Receiver<Option<Arc<dyn MediaStreamTrack + Send + Sync>>>>,
}

impl MockRtpSender {
    /// new creates a new MockRtpSender carrying no track.
    pub fn new() -> Arc<Self> {
        let (replace_calls_tx, replace_calls_rx) = mpsc::channel(16);
        Arc::new(MockRtpSender {
            track: Mutex::new(None),
            replace_track_err: Mutex::new(None),
            replace_calls_tx,
            replace_calls_rx: Mutex::new(replace_calls_rx),
        })
    }

    /// set_track seeds the carried track without recording a replace call.
    pub async fn set_track(&self, track: Option<Arc<dyn MediaStreamTrack + Send + Sync>>) {
        let mut current = self.track.lock().await;
        *current = track;
    }

    /// fail_next_replace makes the next replace_track call return the error
    /// without changing the carried track.
    pub async fn fail_next_replace(&self, err: Error) {
        let mut replace_track_err = self.replace_track_err.lock().await;
        *replace_track_err = Some(err);
    }

    /// next_replace_call returns the next recorded replace_track attempt,
    /// failed ones included.
    pub async fn next_replace_call(&self) -> Option<Option<Arc<dyn MediaStreamTrack + Send + Sync>>> {
        let mut replace_calls_rx = self.replace_calls_rx.lock().await;
        replace_calls_rx.recv().await
    }
}

#[async_trait]
impl RtpSender for MockRtpSender {
    async fn track(&self) -> Option<Arc<dyn MediaStreamTrack + Send + Sync>> {
        let track = self.track.lock().await;
        track.clone()
    }

    async fn replace_track(
        &self,
        track: Option<Arc<dyn MediaStreamTrack + Send + Sync>>,
    ) -> Result<()> {
        {
            let mut replace_track_err = self.replace_track_err.lock().await;
            if let Some(err) = replace_track_err.take() {
                let _ = self.replace_calls_tx.send(track).await;
                return Err(err);
            }
        }

        {
            let mut current = self.track.lock().await;
            *current = track.clone();
        }
        let _ = self.replace_calls_tx.send(track).await;
        Ok(())
    }
}

/// MockConferenceEntry is a conference media role whose transceiver setup
/// can be observed and made to fail.
pub struct MockConferenceEntry {
    kind: MediaKind,
    direction: AtomicU8,
    sender: Option<Arc<MockRtpSender>>,
    create_transceiver_count: AtomicU64,
    create_transceiver_err: Mutex<Option<Error>>,
}

impl MockConferenceEntry {
    /// new creates a new MockConferenceEntry.
    pub fn new(
        kind: MediaKind,
        direction: TransceiverDirection,
        sender: Option<Arc<MockRtpSender>>,
    ) -> Arc<Self> {
        Arc::new(MockConferenceEntry {
            kind,
            direction: AtomicU8::new(direction as u8),
            sender,
            create_transceiver_count: AtomicU64::new(0),
            create_transceiver_err: Mutex::new(None),
        })
    }

    /// mock_sender returns the concrete sender behind this entry.
    pub fn mock_sender(&self) -> Option<Arc<MockRtpSender>> {
        self.sender.clone()
    }

    /// create_transceiver_count returns how many transceivers this entry was
    /// asked to allocate.
    pub fn create_transceiver_count(&self) -> u64 {
        self.create_transceiver_count.load(Ordering::SeqCst)
    }

    /// fail_next_create_transceiver makes the next create_transceiver call
    /// return the error.
    pub async fn fail_next_create_transceiver(&self, err: Error) {
        let mut create_transceiver_err = self.create_transceiver_err.lock().await;
        *create_transceiver_err = Some(err);
    }
}

#[async_trait]
impl ConferenceEntry for MockConferenceEntry {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn direction(&self) -> TransceiverDirection {
        TransceiverDirection::from(self.direction.load(Ordering::SeqCst))
    }

    fn sender(&self) -> Option<Arc<dyn RtpSender + Send + Sync>> {
        self.sender
            .clone()
            .map(|sender| sender as Arc<dyn RtpSender + Send + Sync>)
    }

    async fn create_transceiver(&self, init: TransceiverInit) -> Result<()> {
        self.create_transceiver_count.fetch_add(1, Ordering::SeqCst);

        {
            let mut create_transceiver_err = self.create_transceiver_err.lock().await;
            if let Some(err) = create_transceiver_err.take() {
                return Err(err);
            }
        }

        self.direction.store(init.direction as u8, Ordering::SeqCst);
        Ok(())
    }
}

/// MockConference is a helper struct for testing conference reconciliation.
pub struct MockConference {
    entries: Mutex<Vec<Arc<MockConferenceEntry>>>,
    create_entry_count: AtomicU64,
    create_entry_err: Mutex<Option<Error>>,
}

impl MockConference {
    /// new creates a new MockConference with no entries.
    pub fn new() -> Arc<Self> {
        Arc::new(MockConference {
            entries: Mutex::new(vec![]),
            create_entry_count: AtomicU64::new(0),
            create_entry_err: Mutex::new(None),
        })
    }

    /// add_entry seeds a pre-existing entry.
    pub async fn add_entry(&self, entry: Arc<MockConferenceEntry>) {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
    }

    /// entries returns every entry the conference currently holds, seeded
    /// and created alike.
    pub async fn entries(&self) -> Vec<Arc<MockConferenceEntry>> {
        let entries = self.entries.lock().await;
        entries.clone()
    }

    /// create_entry_count returns how many entries were created on demand.
    pub fn create_entry_count(&self) -> u64 {
        self.create_entry_count.load(Ordering::SeqCst)
    }

    /// fail_next_create_entry makes the next create_entry call return the
    /// error.
    pub async fn fail_next_create_entry(&self, err: Error) {
        let mut create_entry_err = self.create_entry_err.lock().await;
        *create_entry_err = Some(err);
    }
}

#[async_trait]
impl Conference for MockConference {
    async fn find_entry(
        &self,
        predicate: EntryPredicateFn,
    ) -> Option<Arc<dyn ConferenceEntry + Send + Sync>> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .find(|entry| predicate(entry.as_ref()))
            .map(|entry| Arc::clone(entry) as Arc<dyn ConferenceEntry + Send + Sync>)
    }

    async fn create_entry(&self, kind: MediaKind) -> Result<Arc<dyn ConferenceEntry + Send + Sync>> {
        self.create_entry_count.fetch_add(1, Ordering::SeqCst);

        {
            let mut create_entry_err = self.create_entry_err.lock().await;
            if let Some(err) = create_entry_err.take() {
                return Err(err);
            }
        }

        let entry = MockConferenceEntry::new(
            kind,
            TransceiverDirection::Unspecified,
            Some(MockRtpSender::new()),
        );
        {
            let mut entries = self.entries.lock().await;
            entries.push(Arc::clone(&entry));
        }
        Ok(entry as Arc<dyn ConferenceEntry + Send + Sync>)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_mock_conference_entry() -> Result<()> {
        let entry = MockConferenceEntry::new(
            MediaKind::Audio,
            TransceiverDirection::Unspecified,
            Some(MockRtpSender::new()),
        );
        assert_eq!(entry.direction(), TransceiverDirection::Unspecified);

        entry
            .fail_next_create_transceiver(Error::ErrTransceiverSetupFailed)
            .await;
        let result = entry
            .create_transceiver(TransceiverInit {
                direction: TransceiverDirection::Sendonly,
            })
            .await;
        assert_eq!(result, Err(Error::ErrTransceiverSetupFailed));
        assert_eq!(entry.direction(), TransceiverDirection::Unspecified);

        entry
            .create_transceiver(TransceiverInit {
                direction: TransceiverDirection::Sendonly,
            })
            .await?;
        assert_eq!(entry.direction(), TransceiverDirection::Sendonly);
        assert_eq!(entry.create_transceiver_count(), 2);

        Ok(())
    }
}
