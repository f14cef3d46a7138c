use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::media_stream::{MediaStream, MediaStreamTrack};

/// MockMediaStream is a helper struct for testing the stream manager.
pub struct MockMediaStream {
    id: String,
    source_label: Option<String>,
    tracks: Mutex<Vec<Arc<dyn MediaStreamTrack + Send + Sync>>>,
}

impl MockMediaStream {
    /// new creates a new MockMediaStream without a source label.
    pub fn new(id: String) -> Self {
        MockMediaStream {
            id,
            source_label: None,
            tracks: Mutex::new(vec![]),
        }
    }

    /// with_source_label creates a new MockMediaStream describing its media
    /// source.
    pub fn with_source_label(id: String, source_label: String) -> Self {
        MockMediaStream {
            id,
            source_label: Some(source_label),
            tracks: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl MediaStream for MockMediaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn source_label(&self) -> Option<&str> {
        self.source_label.as_deref()
    }

    async fn add_track(&self, track: Arc<dyn MediaStreamTrack + Send + Sync>) {
        let mut tracks = self.tracks.lock().await;
        if tracks.iter().any(|t| t.id() == track.id()) {
            return;
        }
        tracks.push(track);
    }

    async fn remove_track(&self, track: &Arc<dyn MediaStreamTrack + Send + Sync>) {
        let mut tracks = self.tracks.lock().await;
        if let Some(pos) = tracks.iter().position(|t| t.id() == track.id()) {
            tracks.remove(pos);
        }
    }

    async fn get_tracks(&self) -> Vec<Arc<dyn MediaStreamTrack + Send + Sync>> {
        let tracks = self.tracks.lock().await;
        tracks.clone()
    }
}
