//! Consumer event contract
//!
//! The receiver emits [`ReceiverEvent`]s in order onto a queue. Consumers
//! either read the queue directly or hand an [`EventHandler`] to an
//! [`EventDispatcher`], which drains the queue on its own thread so a slow
//! consumer never stalls packet reception.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::merge::MergedResult;
use crate::protocol::Cid;

/// Events delivered to consumers, in production order per receiver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReceiverEvent {
    /// The receiver stopped; `error` is set only on abnormal closure
    SocketClosed { error: Option<String> },
    /// A steady-state merge
    MergedData(MergedResult),
    StartedSampling,
    EndedSampling,
    /// Sources evicted by one expiry sweep or stream termination
    LostSources { cids: Vec<Cid> },
    /// A new source was turned away because the source limit was reached
    ExceededSources,
}

impl ReceiverEvent {
    /// Invoke the matching handler callback
    pub fn dispatch<H: EventHandler + ?Sized>(&self, handler: &mut H) {
        match self {
            ReceiverEvent::SocketClosed { error } => handler.socket_closed(error.as_deref()),
            ReceiverEvent::MergedData(merged) => handler.merged_data(merged),
            ReceiverEvent::StartedSampling => handler.started_sampling(),
            ReceiverEvent::EndedSampling => handler.ended_sampling(),
            ReceiverEvent::LostSources { cids } => handler.lost_sources(cids),
            ReceiverEvent::ExceededSources => handler.exceeded_sources(),
        }
    }
}

/// Callback interface for receiver consumers
///
/// Every method defaults to a no-op so consumers implement only what they use.
pub trait EventHandler: Send + 'static {
    fn socket_closed(&mut self, _error: Option<&str>) {}

    fn merged_data(&mut self, _merged: &MergedResult) {}

    fn started_sampling(&mut self) {}

    fn ended_sampling(&mut self) {}

    fn lost_sources(&mut self, _cids: &[Cid]) {}

    fn exceeded_sources(&mut self) {}
}

/// Drains a receiver's event queue into an [`EventHandler`] on a dedicated thread
pub struct EventDispatcher {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    /// Spawn the dispatch thread
    pub fn spawn<H: EventHandler>(
        events: Receiver<ReceiverEvent>,
        mut handler: H,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_loop = running.clone();

        let handle = thread::Builder::new()
            .name("sacn-event-dispatch".to_string())
            .spawn(move || {
                while running_for_loop.load(Ordering::Relaxed) {
                    match events.recv_timeout(Duration::from_millis(50)) {
                        Ok(event) => event.dispatch(&mut handler),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                // Deliver whatever was queued before the stop request
                for event in events.try_iter() {
                    event.dispatch(&mut handler);
                }
            })?;

        Ok(Self {
            running,
            thread_handle: Some(handle),
        })
    }

    /// Check if the dispatch thread is still delivering events
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Stop dispatching and wait for the thread to exit
    ///
    /// Events already queued are delivered before the thread exits.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
