//! Notifications raised while the client works.
//!
//! The observer is injected at construction and called from whichever thread
//! triggers the event: the transport's reader thread for receive-side events,
//! the caller's thread for progress. Implementations must not call back into
//! the client. [`EventChannel`] adapts the observer interface onto a channel
//! for callers that prefer to drain events at their own pace.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::detect::CommSettings;

/// Receiver-side and progress notifications.
///
/// All methods default to no-ops so implementors pick only what they need.
pub trait ClientObserver: Send + Sync {
    /// A solicited reply was matched to transaction slot `slot`.
    fn data_received(&self, _slot: u8) {}

    /// The controller initiated a command of its own; `frame` is the full
    /// received body. The link has already acknowledged it on the wire.
    fn unsolicited_message(&self, _frame: &[u8]) {}

    /// Auto-detect is about to probe with the given settings.
    fn auto_detect_try(&self, _settings: &CommSettings) {}

    /// A program file finished uploading.
    fn upload_progress(&self, _done: usize, _total: usize) {}

    /// A program file finished downloading.
    fn download_progress(&self, _done: usize, _total: usize) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl ClientObserver for NullObserver {}

/// An event as carried by [`EventChannel`].
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// A solicited reply completed the given slot.
    DataReceived {
        /// Transaction slot index.
        slot: u8,
    },
    /// The controller initiated a command.
    UnsolicitedMessage {
        /// Full received body.
        frame: Vec<u8>,
    },
    /// Auto-detect probe attempt.
    AutoDetectTry {
        /// Settings under trial.
        settings: CommSettings,
    },
    /// Upload progress tick.
    UploadProgress {
        /// Files finished.
        done: usize,
        /// Files total.
        total: usize,
    },
    /// Download progress tick.
    DownloadProgress {
        /// Files finished.
        done: usize,
        /// Files total.
        total: usize,
    },
}

/// Forwards observer calls into a crossbeam channel.
///
/// Send failures are ignored: a caller that dropped the receiver has opted
/// out of events.
#[derive(Debug)]
pub struct EventChannel {
    sender: Sender<ClientEvent>,
}

impl EventChannel {
    /// Creates the observer plus the receiver the caller drains.
    #[must_use]
    pub fn unbounded() -> (Arc<Self>, Receiver<ClientEvent>) {
        let (sender, receiver) = unbounded();
        (Arc::new(Self { sender }), receiver)
    }
}

impl ClientObserver for EventChannel {
    fn data_received(&self, slot: u8) {
        let _ = self.sender.send(ClientEvent::DataReceived { slot });
    }

    fn unsolicited_message(&self, frame: &[u8]) {
        let _ = self.sender.send(ClientEvent::UnsolicitedMessage {
            frame: frame.to_vec(),
        });
    }

    fn auto_detect_try(&self, settings: &CommSettings) {
        let _ = self.sender.send(ClientEvent::AutoDetectTry {
            settings: *settings,
        });
    }

    fn upload_progress(&self, done: usize, total: usize) {
        let _ = self.sender.send(ClientEvent::UploadProgress { done, total });
    }

    fn download_progress(&self, done: usize, total: usize) {
        let _ = self.sender.send(ClientEvent::DownloadProgress { done, total });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_observer_forwards_events() {
        let (observer, receiver) = EventChannel::unbounded();
        observer.data_received(7);
        observer.upload_progress(1, 4);
        match receiver.try_recv() {
            Ok(ClientEvent::DataReceived { slot }) => assert_eq!(slot, 7),
            other => panic!("unexpected event {other:?}"),
        }
        match receiver.try_recv() {
            Ok(ClientEvent::UploadProgress { done, total }) => {
                assert_eq!((done, total), (1, 4));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let (observer, receiver) = EventChannel::unbounded();
        drop(receiver);
        observer.data_received(1);
    }
}
