//! sACN receiver lifecycle
//!
//! A [`SacnReceiver`] listens on one universe. While running it owns:
//!
//! - one read task per socket, forwarding datagrams onto a bounded queue
//! - one dispatch task that owns the [`ReceiverEngine`] and serializes
//!   datagrams, the sampling deadline and expiry ticks onto a single path
//!
//! Events leave the dispatch task through an unbounded crossbeam channel, so
//! consumers on any thread see them in production order and a slow consumer
//! never blocks reception. The receiver holds only the sending half; with no
//! subscriber, events are dropped.

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ReceiverConfig;
use crate::constants::{DATAGRAM_QUEUE_CAPACITY, MAX_PACKET_SIZE};
use crate::engine::ReceiverEngine;
use crate::error::{NetworkError, ReceiverError, Result};
use crate::events::ReceiverEvent;
use crate::network::udp::{create_sockets, UdpSocket};
use crate::stats::{ReceiverStats, SharedStats, StatsSnapshot};

/// Receiver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Stopped,
    Starting,
    Running,
}

/// A datagram read from a socket
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub from: SocketAddr,
}

type DatagramResult = std::result::Result<Datagram, NetworkError>;

/// Sending half of the current subscription, if any
type EventSink = Arc<RwLock<Option<Sender<ReceiverEvent>>>>;

/// Handles for one start/stop cycle
struct Run {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    local_addrs: Vec<SocketAddr>,
    universe: u16,
    /// Extra handle onto the datagram queue for injecting socket failures
    #[cfg(test)]
    fault_tx: mpsc::Sender<DatagramResult>,
}

/// Streaming ACN receiver for a single universe
pub struct SacnReceiver {
    state: Arc<RwLock<ReceiverState>>,
    events: EventSink,
    stats: SharedStats,
    run: Option<Run>,
}

impl SacnReceiver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ReceiverState::Stopped)),
            events: Arc::new(RwLock::new(None)),
            stats: Arc::new(ReceiverStats::new()),
            run: None,
        }
    }

    /// Subscribe to events produced from now on, across all runs
    ///
    /// Replaces any previous subscription, whose queue then disconnects.
    /// Events produced while nobody is subscribed are discarded.
    pub fn subscribe(&self) -> Receiver<ReceiverEvent> {
        let (tx, rx) = unbounded();
        *self.events.write() = Some(tx);
        rx
    }

    /// Bind sockets and begin receiving
    ///
    /// Rejected while already running. Must be called from within a tokio
    /// runtime. On success the receiver is `Running` and sampling.
    pub async fn start(&mut self, config: ReceiverConfig) -> Result<()> {
        if self.state() == ReceiverState::Running {
            return Err(ReceiverError::AlreadyRunning.into());
        }
        config.validate()?;

        // A previous run may have ended on a socket error
        self.reap().await;

        *self.state.write() = ReceiverState::Starting;
        let sockets = match create_sockets(&config) {
            Ok(sockets) => sockets,
            Err(e) => {
                *self.state.write() = ReceiverState::Stopped;
                tracing::error!("Failed to start receiver for universe {}: {}", config.universe, e);
                return Err(e);
            }
        };
        let local_addrs: Vec<SocketAddr> = sockets
            .iter()
            .filter_map(|socket| socket.local_addr().ok())
            .collect();

        self.stats.reset();
        let (datagram_tx, datagram_rx) = mpsc::channel::<DatagramResult>(DATAGRAM_QUEUE_CAPACITY);
        let readers: Vec<JoinHandle<()>> = sockets
            .into_iter()
            .map(|socket| tokio::spawn(read_loop(socket, datagram_tx.clone())))
            .collect();
        #[cfg(test)]
        let fault_tx = datagram_tx.clone();
        drop(datagram_tx);

        let engine = ReceiverEngine::new(&config, self.stats.clone(), Instant::now());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        *self.state.write() = ReceiverState::Running;
        let task = tokio::spawn(dispatch_loop(DispatchContext {
            engine,
            datagrams: datagram_rx,
            readers,
            shutdown: shutdown_rx,
            events: self.events.clone(),
            state: self.state.clone(),
            expiry_interval: config.timing.expiry_interval(),
        }));

        tracing::info!(
            "sACN receiver started on universe {} ({:?})",
            config.universe,
            local_addrs
        );

        self.run = Some(Run {
            shutdown_tx,
            task,
            local_addrs,
            universe: config.universe,
            #[cfg(test)]
            fault_tx,
        });
        Ok(())
    }

    /// Close sockets, cancel timers and clear all sources
    ///
    /// Idempotent. No events are produced after this returns.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        let _ = run.shutdown_tx.send(());
        if let Err(e) = run.task.await {
            tracing::error!("Receiver task for universe {} failed: {}", run.universe, e);
        }
        *self.state.write() = ReceiverState::Stopped;
    }

    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ReceiverState::Running
    }

    /// Addresses the current run is bound to
    pub fn local_addrs(&self) -> &[SocketAddr] {
        match &self.run {
            Some(run) => &run.local_addrs,
            None => &[],
        }
    }

    /// Universe of the current or most recent run
    pub fn universe(&self) -> Option<u16> {
        self.run.as_ref().map(|run| run.universe)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for a finished run (after a socket error) and release its handles
    async fn reap(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.shutdown_tx.send(());
            let _ = run.task.await;
        }
    }
}

impl Default for SacnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SacnReceiver {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.shutdown_tx.send(());
        }
    }
}

struct DispatchContext {
    engine: ReceiverEngine,
    datagrams: mpsc::Receiver<DatagramResult>,
    readers: Vec<JoinHandle<()>>,
    shutdown: oneshot::Receiver<()>,
    events: EventSink,
    state: Arc<RwLock<ReceiverState>>,
    expiry_interval: Duration,
}

/// Serializes packet handling and timers for one run
async fn dispatch_loop(ctx: DispatchContext) {
    let DispatchContext {
        mut engine,
        mut datagrams,
        readers,
        mut shutdown,
        events,
        state,
        expiry_interval,
    } = ctx;

    let mut expiry = tokio::time::interval_at(
        tokio::time::Instant::now() + expiry_interval,
        expiry_interval,
    );
    expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    deliver(&events, engine.drain_events());

    let failure = loop {
        let sampling_deadline = engine.sampling_deadline();

        tokio::select! {
            biased;

            _ = &mut shutdown => break None,

            _ = tokio::time::sleep_until(sampling_deadline.unwrap_or_else(Instant::now).into()),
                if sampling_deadline.is_some() =>
            {
                engine.poll_sampling(Instant::now());
            }

            _ = expiry.tick() => engine.sweep(Instant::now()),

            received = datagrams.recv() => match received {
                Some(Ok(datagram)) => {
                    engine.handle_datagram(&datagram.payload, Some(datagram.from), Instant::now());
                }
                Some(Err(e)) => break Some(e),
                None => break Some(NetworkError::ReceiveFailed("all sockets closed".to_string())),
            },
        }

        deliver(&events, engine.drain_events());
    };

    for reader in &readers {
        reader.abort();
    }
    engine.clear();
    *state.write() = ReceiverState::Stopped;

    let error = match failure {
        Some(e) => {
            tracing::error!("sACN receiver for universe {} closed: {}", engine.universe(), e);
            Some(e.to_string())
        }
        None => {
            tracing::info!("sACN receiver for universe {} stopped", engine.universe());
            None
        }
    };
    deliver(&events, vec![ReceiverEvent::SocketClosed { error }]);
}

fn deliver(events: &EventSink, batch: Vec<ReceiverEvent>) {
    if batch.is_empty() {
        return;
    }
    let sink = events.read();
    let Some(tx) = sink.as_ref() else {
        tracing::trace!("No subscriber, dropped {} event(s)", batch.len());
        return;
    };
    let count = batch.len();
    for event in batch {
        if tx.send(event).is_err() {
            tracing::trace!("Subscriber gone, dropped {} event(s)", count);
            return;
        }
    }
}

/// Forward datagrams from one socket until it fails or the queue closes
async fn read_loop(socket: UdpSocket, datagrams: mpsc::Sender<DatagramResult>) {
    let mut buf = vec![0u8; MAX_PACKET_SIZE];
    loop {
        match socket.socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let datagram = Datagram {
                    payload: Bytes::copy_from_slice(&buf[..len]),
                    from,
                };
                if datagrams.send(Ok(datagram)).await.is_err() {
                    break;
                }
            }
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                let error = NetworkError::ReceiveFailed(format!("{}: {}", socket.label, e));
                let _ = datagrams.send(Err(error)).await;
                break;
            }
        }
    }
}

/// Errors a UDP socket can report without being unusable
fn is_transient(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        error.kind(),
        ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unicast_config(universe: u16) -> ReceiverConfig {
        ReceiverConfig {
            port: 0,
            join_multicast: false,
            ..ReceiverConfig::for_universe(universe)
        }
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let mut receiver = SacnReceiver::new();
        let events = receiver.subscribe();
        assert_eq!(receiver.state(), ReceiverState::Stopped);

        receiver.start(unicast_config(1)).await.unwrap();
        assert!(receiver.is_running());
        assert_eq!(receiver.local_addrs().len(), 1);
        assert_eq!(receiver.universe(), Some(1));

        assert!(matches!(
            receiver.start(unicast_config(1)).await,
            Err(crate::Error::Receiver(ReceiverError::AlreadyRunning))
        ));

        receiver.stop().await;
        assert_eq!(receiver.state(), ReceiverState::Stopped);
        receiver.stop().await;

        let received: Vec<ReceiverEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ReceiverEvent::StartedSampling,
                ReceiverEvent::SocketClosed { error: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_without_state_change() {
        let mut receiver = SacnReceiver::new();
        assert!(matches!(
            receiver.start(unicast_config(0)).await,
            Err(crate::Error::Receiver(ReceiverError::InvalidUniverse(0)))
        ));
        assert_eq!(receiver.state(), ReceiverState::Stopped);
        assert!(receiver.subscribe().try_recv().is_err());
    }

    #[tokio::test]
    async fn test_socket_failure_closes_with_error() {
        let config = unicast_config(1);
        let (datagram_tx, datagram_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let (events_tx, events_rx) = unbounded();
        let state = Arc::new(RwLock::new(ReceiverState::Running));

        datagram_tx
            .send(Err(NetworkError::ReceiveFailed("network unreachable".to_string())))
            .await
            .unwrap();

        dispatch_loop(DispatchContext {
            engine: ReceiverEngine::new(&config, Arc::new(ReceiverStats::new()), Instant::now()),
            datagrams: datagram_rx,
            readers: Vec::new(),
            shutdown: shutdown_rx,
            events: Arc::new(RwLock::new(Some(events_tx))),
            state: state.clone(),
            expiry_interval: config.timing.expiry_interval(),
        })
        .await;

        assert_eq!(*state.read(), ReceiverState::Stopped);
        let received: Vec<ReceiverEvent> = events_rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], ReceiverEvent::StartedSampling);
        assert!(matches!(
            &received[1],
            ReceiverEvent::SocketClosed { error: Some(e) } if e.contains("network unreachable")
        ));
    }

    #[tokio::test]
    async fn test_restart_after_socket_failure() {
        let mut receiver = SacnReceiver::new();
        let events = receiver.subscribe();
        receiver.start(unicast_config(1)).await.unwrap();

        let fault_tx = receiver.run.as_ref().unwrap().fault_tx.clone();
        fault_tx
            .send(Err(NetworkError::ReceiveFailed("socket reset".to_string())))
            .await
            .unwrap();
        drop(fault_tx);

        let mut received = Vec::new();
        for _ in 0..200 {
            received.extend(events.try_iter());
            if matches!(received.last(), Some(ReceiverEvent::SocketClosed { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(matches!(
            received.last(),
            Some(ReceiverEvent::SocketClosed { error: Some(e) }) if e.contains("socket reset")
        ));
        // State is settled before the closing event is delivered
        assert_eq!(receiver.state(), ReceiverState::Stopped);
        assert!(!receiver.is_running());

        receiver.start(unicast_config(1)).await.unwrap();
        assert!(receiver.is_running());
        receiver.stop().await;

        let received: Vec<ReceiverEvent> = events.try_iter().collect();
        assert_eq!(
            received,
            vec![
                ReceiverEvent::StartedSampling,
                ReceiverEvent::SocketClosed { error: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_events_without_subscriber_are_discarded() {
        let mut receiver = SacnReceiver::new();
        receiver.start(unicast_config(1)).await.unwrap();
        receiver.stop().await;

        // Nothing from the unobserved run was retained
        let events = receiver.subscribe();
        assert!(events.try_recv().is_err());

        receiver.start(unicast_config(1)).await.unwrap();
        receiver.stop().await;
        assert_eq!(events.try_iter().count(), 2);
    }

    #[test]
    fn test_resubscribe_disconnects_previous_queue() {
        let receiver = SacnReceiver::new();
        let first = receiver.subscribe();
        let _second = receiver.subscribe();
        assert_eq!(
            first.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn test_transient_errors() {
        use std::io::{Error, ErrorKind};
        assert!(is_transient(&Error::from(ErrorKind::ConnectionReset)));
        assert!(!is_transient(&Error::from(ErrorKind::NotConnected)));
    }
}
