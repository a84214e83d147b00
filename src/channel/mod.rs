// Message channel: typed commands in, typed events out, one session per client.

mod dispatcher;
mod message;

pub use dispatcher::{Dispatcher, DispatcherDeps};
pub use message::{CAPABILITIES, Command, CoreEvent, decode_command};

use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of a session. Cloned into every task that answers a command.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<CoreEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventSink { tx }, rx)
    }

    /// Waits for queue space. A closed session drops the event.
    pub async fn emit(&self, event: CoreEvent) {
        let name = event.name();
        if self.tx.send(event).await.is_err() {
            debug!(event = name, "session closed; event dropped");
        }
    }
}
