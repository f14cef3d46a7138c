use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

use portable_atomic::{AtomicU64, Ordering};

use crate::media_stream::media_kind::MediaKind;
use crate::media_stream::{MediaStreamTrack, OnTrackEndedHdlrFn, TrackEndedSubscription};

type EndedHandlers = Mutex<Vec<(u64, OnTrackEndedHdlrFn)>>;

/// MockMediaTrack is a helper struct for testing the stream manager. The
/// track terminates when the test calls fire_ended.
pub struct MockMediaTrack {
    id: String,
    kind: MediaKind,
    next_subscription_id: AtomicU64,
    ended_handlers: Arc<EndedHandlers>,
}

impl MockMediaTrack {
    /// new creates a new MockMediaTrack.
    pub fn new(id: String, kind: MediaKind) -> Self {
        MockMediaTrack {
            id,
            kind,
            next_subscription_id: AtomicU64::new(0),
            ended_handlers: Arc::new(Mutex::new(vec![])),
        }
    }

    /// fire_ended fires every registered handler and drops them, so the
    /// track terminates at most once.
    pub async fn fire_ended(&self) {
        let handlers: Vec<(u64, OnTrackEndedHdlrFn)> = {
            let mut handlers = match self.ended_handlers.lock() {
                Ok(handlers) => handlers,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers.drain(..).collect()
        };
        for (_, mut f) in handlers {
            f().await;
        }
    }

    /// ended_handler_count returns how many track-ended handlers remain
    /// registered.
    pub fn ended_handler_count(&self) -> usize {
        let handlers = match self.ended_handlers.lock() {
            Ok(handlers) => handlers,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.len()
    }
}

struct MockTrackEndedSubscription {
    handlers: Weak<EndedHandlers>,
    subscription_id: u64,
}

impl TrackEndedSubscription for MockTrackEndedSubscription {
    fn cancel(&self) {
        if let Some(handlers) = self.handlers.upgrade() {
            let mut handlers = match handlers.lock() {
                Ok(handlers) => handlers,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers.retain(|(id, _)| *id != self.subscription_id);
        }
    }
}

impl MediaStreamTrack for MockMediaTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn on_ended(&self, f: OnTrackEndedHdlrFn) -> Box<dyn TrackEndedSubscription + Send + Sync> {
        let subscription_id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut handlers = match self.ended_handlers.lock() {
                Ok(handlers) => handlers,
                Err(poisoned) => poisoned.into_inner(),
            };
            handlers.push((subscription_id, f));
        }
        Box::new(MockTrackEndedSubscription {
            handlers: Arc::downgrade(&self.ended_handlers),
            subscription_id,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
