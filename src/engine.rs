//! Receiver engine
//!
//! Single-threaded core of a running receiver: it owns the source table,
//! the sampling controller and the expiry monitor, and turns datagrams and
//! timer ticks into an ordered list of [`ReceiverEvent`]s. Time is passed in
//! by the caller, so the engine is deterministic and knows nothing about
//! sockets or tasks.
//!
//! ```text
//!  datagram ──► PacketDecoder ──► filters ──► SourceTable ──► merge ──► events
//!                                 (preview,      ▲   │
//!                                  excluded,     │   └── ExpiryMonitor (tick)
//!                                  terminated)   │
//!                                         SamplingController (deadline)
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use crate::codec::{DataPacket, Decoded, PacketDecoder};
use crate::config::ReceiverConfig;
use crate::error::SourceError;
use crate::events::ReceiverEvent;
use crate::expiry::ExpiryMonitor;
use crate::merge::{merge, MergedResult};
use crate::protocol::Cid;
use crate::sampling::{SamplingController, SamplingState};
use crate::sources::{Source, SourceTable, TerminateOutcome, UpsertOutcome};
use crate::stats::SharedStats;

/// Deterministic receive core for one universe
pub struct ReceiverEngine {
    decoder: PacketDecoder,
    table: SourceTable,
    sampling: SamplingController,
    expiry: ExpiryMonitor,
    filter_preview_data: bool,
    excluded_cids: Vec<Cid>,
    stats: SharedStats,
    /// Set once `ExceededSources` has been raised for the current over-limit episode
    limit_signaled: bool,
    outbox: Vec<ReceiverEvent>,
}

impl ReceiverEngine {
    /// Create an engine that enters its sampling window at `now`
    ///
    /// The `StartedSampling` event is queued immediately.
    pub fn new(config: &ReceiverConfig, stats: SharedStats, now: Instant) -> Self {
        let timing = &config.timing;
        tracing::info!(
            "Universe {}: sampling sources for {:?}",
            config.universe,
            timing.sampling_period()
        );

        Self {
            decoder: PacketDecoder::new(config.universe),
            table: SourceTable::new(config.source_limit, config.sequence_window()),
            sampling: SamplingController::start(timing.sampling_period(), now),
            expiry: ExpiryMonitor::new(timing.source_loss_timeout(), timing.expiry_interval()),
            filter_preview_data: config.filter_preview_data,
            excluded_cids: config.excluded_cids.clone(),
            stats,
            limit_signaled: false,
            outbox: vec![ReceiverEvent::StartedSampling],
        }
    }

    /// Process one datagram received from `from`
    pub fn handle_datagram(&mut self, buf: &[u8], from: Option<SocketAddr>, now: Instant) {
        // A datagram arriving after the deadline belongs to steady state
        self.poll_sampling(now);
        self.stats.record_datagram(buf.len());

        let packet = match self.decoder.decode(buf) {
            Ok(Decoded::Data(packet)) => packet,
            Ok(Decoded::Ignored(reason)) => {
                self.stats.record_ignored();
                tracing::trace!("Ignored packet from {:?}: {:?}", from, reason);
                return;
            }
            Err(e) => {
                self.stats.record_malformed();
                tracing::trace!("Dropped datagram from {:?}: {}", from, e);
                return;
            }
        };

        if self.excluded_cids.contains(&packet.cid) {
            self.stats.record_filtered();
            return;
        }
        if self.filter_preview_data && packet.is_preview {
            self.stats.record_filtered();
            tracing::trace!("Filtered preview data from {}", packet.cid);
            return;
        }

        if packet.is_terminated {
            self.handle_termination(&packet);
            return;
        }

        match self.table.upsert(&packet, from, now) {
            Ok(UpsertOutcome::Created) => {
                self.stats.record_accepted();
                tracing::debug!(
                    "New source {} \"{}\" from {:?} (priority {})",
                    packet.cid,
                    packet.source_name,
                    from,
                    packet.priority
                );
                self.emit_merge();
            }
            Ok(UpsertOutcome::Updated) => {
                self.stats.record_accepted();
                self.emit_merge();
            }
            Ok(UpsertOutcome::OutOfSequence { last, received }) => {
                self.stats.record_out_of_sequence();
                tracing::trace!(
                    "Out-of-sequence packet from {}: last {}, received {}",
                    packet.cid,
                    last,
                    received
                );
            }
            Err(SourceError::LimitReached(limit)) => {
                self.stats.record_source_rejected();
                if !self.limit_signaled {
                    self.limit_signaled = true;
                    tracing::debug!("Source limit {} reached, rejected {}", limit, packet.cid);
                    self.outbox.push(ReceiverEvent::ExceededSources);
                }
            }
        }
    }

    /// Close the sampling window if its deadline has passed
    pub fn poll_sampling(&mut self, now: Instant) {
        if self.sampling.poll(now) {
            tracing::info!(
                "Sampling ended with {} source(s)",
                self.table.len()
            );
            self.outbox.push(ReceiverEvent::EndedSampling);
            self.emit_merge();
        }
    }

    /// Run one expiry sweep
    pub fn sweep(&mut self, now: Instant) {
        let lost = self.expiry.sweep(&mut self.table, now);
        if lost.is_empty() {
            return;
        }
        self.rearm_limit();
        self.outbox.push(ReceiverEvent::LostSources { cids: lost });
        self.emit_merge();
    }

    /// Take every event produced since the last call, in order
    pub fn drain_events(&mut self) -> Vec<ReceiverEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Deadline of the sampling window while still sampling
    pub fn sampling_deadline(&self) -> Option<Instant> {
        self.sampling
            .is_sampling()
            .then(|| self.sampling.deadline())
    }

    pub fn sampling_state(&self) -> SamplingState {
        self.sampling.state()
    }

    pub fn expiry(&self) -> &ExpiryMonitor {
        &self.expiry
    }

    pub fn universe(&self) -> u16 {
        self.decoder.universe()
    }

    /// Read-only view of the tracked sources
    pub fn sources(&self) -> Vec<&Source> {
        self.table.snapshot()
    }

    pub fn source_count(&self) -> usize {
        self.table.len()
    }

    /// Merge of the current table, regardless of sampling state
    pub fn current_merge(&self) -> MergedResult {
        merge(&self.table.snapshot())
    }

    /// Drop all sources at shutdown
    pub fn clear(&mut self) {
        self.table.clear();
        self.limit_signaled = false;
    }

    fn handle_termination(&mut self, packet: &DataPacket) {
        let cid = packet.cid;
        match self.table.terminate(packet) {
            TerminateOutcome::Removed => {}
            TerminateOutcome::Unknown => {
                self.stats.record_ignored();
                return;
            }
            TerminateOutcome::OutOfSequence { last, received } => {
                self.stats.record_out_of_sequence();
                tracing::trace!(
                    "Out-of-sequence termination from {}: last {}, received {}",
                    cid,
                    last,
                    received
                );
                return;
            }
        }
        tracing::debug!("Source {} terminated its stream", cid);
        self.stats.record_accepted();
        self.rearm_limit();
        self.outbox.push(ReceiverEvent::LostSources { cids: vec![cid] });
        self.emit_merge();
    }

    fn rearm_limit(&mut self) {
        if !self.table.is_full() {
            self.limit_signaled = false;
        }
    }

    /// Queue a merge unless still sampling
    fn emit_merge(&mut self) {
        if self.sampling.is_sampling() {
            return;
        }
        let merged = self.current_merge();
        self.outbox.push(ReceiverEvent::MergedData(merged));
    }
}
