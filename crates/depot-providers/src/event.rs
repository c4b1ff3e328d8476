//! Repository events
//!
//! Providers announce remote searches and remote fetches through an
//! [`EventDispatcher`]. Dispatch is fire-and-forget: no subscriber can fail
//! or slow down the operation that raised the event.

use depot_metadata::{Paginator, Predicate};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryEvent {
    /// A search or count ran against a proxy repository
    RemoteRepositorySearch {
        storage_id: String,
        repository_id: String,
        predicate: Predicate,
        /// `None` for counts
        paginator: Option<Paginator>,
    },
    /// A proxied artifact was downloaded and cached locally
    ArtifactFetchedFromRemote {
        storage_id: String,
        repository_id: String,
        path: String,
    },
}

pub trait EventDispatcher: Send + Sync {
    fn dispatch_event(&self, event: RepositoryEvent);
}

/// Dispatcher fanning events out to any number of tokio broadcast receivers.
///
/// Events raised while nobody is subscribed are dropped; slow subscribers
/// observe `RecvError::Lagged` rather than blocking providers.
#[derive(Clone)]
pub struct BroadcastEventChannel {
    sender: broadcast::Sender<RepositoryEvent>,
}

impl BroadcastEventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventDispatcher for BroadcastEventChannel {
    fn dispatch_event(&self, event: RepositoryEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::trace!(receivers, "Dispatched repository event"),
            Err(_) => tracing::trace!("Repository event dropped, no subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let channel = BroadcastEventChannel::new(8);
        let mut rx = channel.subscribe();

        channel.dispatch_event(RepositoryEvent::ArtifactFetchedFromRemote {
            storage_id: "storage0".to_string(),
            repository_id: "npmjs".to_string(),
            path: "react/react/18.2.0/react-18.2.0.tgz".to_string(),
        });

        match rx.recv().await.unwrap() {
            RepositoryEvent::ArtifactFetchedFromRemote { repository_id, .. } => {
                assert_eq!(repository_id, "npmjs")
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_without_subscribers_is_silent() {
        let channel = BroadcastEventChannel::default();
        channel.dispatch_event(RepositoryEvent::RemoteRepositorySearch {
            storage_id: "storage0".to_string(),
            repository_id: "npmjs".to_string(),
            predicate: Predicate::empty(),
            paginator: None,
        });
    }
}
