//! Canned traffic across a simulated link.
//!
//! The primary core streams a seeded corpus of variable-length messages to
//! the secondary on one channel. Deliveries and completions travel back to
//! the driver over channels, so the same driver works whether interrupts are
//! pumped on the calling thread or serviced by [`IrqThread`](crate::IrqThread)s.

use std::ops::Range;
use std::time::{Duration, Instant};

use corelink::{ChannelId, Handlers, LinkConfig, MetricsSnapshot, SendError};
use corelink_transport::{CoreSide, Event};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{SimError, SimResult};
use crate::link::SimLink;

/// Upper bound on the bytes a backpressure receiver takes per call. Every
/// corpus message is longer, so each one arrives in pieces.
pub const BACKPRESSURE_CHUNK: usize = 5;

const MIN_MESSAGE: usize = 8;
const MAX_MESSAGE: usize = 32;
const IDLE_STEPS: usize = 8;
const THREADED_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Send everything as fast as descriptors allow.
    Flood { messages: u32 },
    /// Send `burst_size` messages, wait for all completions, repeat.
    Burst { bursts: u32, burst_size: u32 },
    /// Flood a receiver that consumes a few bytes per call.
    Backpressure { messages: u32 },
}

impl ScenarioKind {
    pub fn flood(messages: u32) -> Self {
        ScenarioKind::Flood { messages }
    }

    pub fn burst(bursts: u32, burst_size: u32) -> Self {
        ScenarioKind::Burst { bursts, burst_size }
    }

    pub fn backpressure(messages: u32) -> Self {
        ScenarioKind::Backpressure { messages }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Flood { .. } => "flood",
            ScenarioKind::Burst { .. } => "burst",
            ScenarioKind::Backpressure { .. } => "backpressure",
        }
    }

    pub fn message_count(&self) -> usize {
        match *self {
            ScenarioKind::Flood { messages } | ScenarioKind::Backpressure { messages } => {
                messages as usize
            }
            ScenarioKind::Burst { bursts, burst_size } => bursts as usize * burst_size as usize,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    pub link: LinkConfig,
    pub channel: ChannelId,
    pub flow_control: bool,
    /// Service interrupts on one thread per core instead of pumping.
    pub threaded: bool,
    pub seed: u64,
}

impl ScenarioConfig {
    pub fn new(kind: ScenarioKind) -> Self {
        Self {
            kind,
            link: LinkConfig::default(),
            channel: ChannelId::new(0),
            flow_control: false,
            threaded: false,
            seed: 0x5eed,
        }
    }

    pub fn with_link(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    pub fn with_flow_control(mut self, flow_control: bool) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// What a scenario run observed.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub kind: ScenarioKind,
    pub messages: usize,
    /// Bytes of the whole corpus, in send order.
    pub expected: &'static [u8],
    /// Bytes the receiver consumed, in arrival order.
    pub received: Vec<u8>,
    /// Corpus indices in completion-callback order.
    pub completed: Vec<usize>,
    /// Largest in-flight plus pending depth seen after a send.
    pub max_outstanding: usize,
    pub sender: MetricsSnapshot,
    pub receiver: MetricsSnapshot,
    pub send_doorbells: u64,
    pub done_doorbells: u64,
    pub wake_acquires: u64,
    pub wake_releases: u64,
    pub wake_held: bool,
}

/// Seeded message corpus living for the rest of the program.
struct Corpus {
    bytes: &'static [u8],
    spans: Vec<Range<usize>>,
}

impl Corpus {
    fn generate(count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bytes = Vec::new();
        let mut spans = Vec::with_capacity(count);
        for index in 0..count {
            let len = rng.gen_range(MIN_MESSAGE..=MAX_MESSAGE);
            let start = bytes.len();
            bytes.extend_from_slice(&(index as u32).to_le_bytes());
            bytes.extend((4..len).map(|_| rng.gen::<u8>()));
            spans.push(start..bytes.len());
        }
        // Payloads must outlive every completion; the simulation never
        // reclaims them.
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        Self { bytes, spans }
    }

    fn message(&self, index: usize) -> &'static [u8] {
        let bytes = self.bytes;
        &bytes[self.spans[index].clone()]
    }

    /// Maps a completed buffer back to its corpus index.
    fn index_of(&self, buf: &[u8]) -> Option<usize> {
        let offset = (buf.as_ptr() as usize).checked_sub(self.bytes.as_ptr() as usize)?;
        self.spans.binary_search_by_key(&offset, |span| span.start).ok()
    }
}

/// Runs `config` to completion on a fresh link.
pub fn run(config: &ScenarioConfig) -> SimResult<ScenarioReport> {
    let link = SimLink::new(config.link)?;
    let corpus = Corpus::generate(config.kind.message_count(), config.seed);
    let ch = config.channel;

    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    link.primary().open(
        ch,
        Handlers::new().on_sent(move |buf| {
            // The driver may already be gone after a failed run.
            let _ = done_tx.send(buf);
        }),
        config.flow_control,
    )?;

    let (rx_tx, rx_rx) = crossbeam_channel::unbounded();
    let chunked = matches!(config.kind, ScenarioKind::Backpressure { .. });
    let mut rng = StdRng::seed_from_u64(config.seed ^ 0xb4c5);
    link.secondary().open(
        ch,
        Handlers::new().on_receive(move |buf| {
            let take = if chunked {
                rng.gen_range(0..=BACKPRESSURE_CHUNK).min(buf.len())
            } else {
                buf.len()
            };
            let _ = rx_tx.send(buf[..take].to_vec());
            take
        }),
        config.flow_control,
    )?;

    tracing::info!(
        "running {} scenario: {} messages ({} bytes), flow control {}, {}",
        config.kind.name(),
        corpus.spans.len(),
        corpus.bytes.len(),
        config.flow_control,
        if config.threaded { "threaded" } else { "pumped" }
    );

    let irqs = if config.threaded {
        Some((
            link.spawn_irq(CoreSide::Primary)?,
            link.spawn_irq(CoreSide::Secondary)?,
        ))
    } else {
        None
    };

    let mut driver = Driver {
        link: &link,
        channel: ch,
        threaded: config.threaded,
        corpus: &corpus,
        completions: done_rx,
        deliveries: rx_rx,
        completed: Vec::with_capacity(corpus.spans.len()),
        received: Vec::with_capacity(corpus.bytes.len()),
        sent: 0,
        max_outstanding: 0,
        started: Instant::now(),
    };
    let outcome = driver.run(config.kind);

    if let Some((primary, secondary)) = irqs {
        let dispatched = primary.stop() + secondary.stop();
        tracing::debug!("interrupt threads dispatched {dispatched} doorbells");
    }
    outcome?;
    driver.collect();

    let snapshot = |side: CoreSide| {
        link.table(side)
            .snapshot(ch)
            .map(|snap| snap.metrics)
            .unwrap_or_default()
    };
    let wake = link.wake(CoreSide::Primary);
    let report = ScenarioReport {
        kind: config.kind,
        messages: corpus.spans.len(),
        expected: corpus.bytes,
        received: driver.received,
        completed: driver.completed,
        max_outstanding: driver.max_outstanding,
        sender: snapshot(CoreSide::Primary),
        receiver: snapshot(CoreSide::Secondary),
        send_doorbells: link.bank().notifications(CoreSide::Primary, Event::Send),
        done_doorbells: link.bank().notifications(CoreSide::Secondary, Event::RecvDone),
        wake_acquires: wake.acquires(),
        wake_releases: wake.releases(),
        wake_held: wake.held(),
    };
    tracing::info!(
        "{} scenario done: {} completed, {} bytes received, {} partial, {} pool exhausted",
        config.kind.name(),
        report.completed.len(),
        report.received.len(),
        report.receiver.partial,
        report.sender.pool_exhausted
    );
    Ok(report)
}

struct Driver<'a> {
    link: &'a SimLink,
    channel: ChannelId,
    threaded: bool,
    corpus: &'a Corpus,
    completions: Receiver<&'static [u8]>,
    deliveries: Receiver<Vec<u8>>,
    completed: Vec<usize>,
    received: Vec<u8>,
    sent: usize,
    max_outstanding: usize,
    started: Instant,
}

impl Driver<'_> {
    fn run(&mut self, kind: ScenarioKind) -> SimResult<()> {
        match kind {
            ScenarioKind::Flood { .. } | ScenarioKind::Backpressure { .. } => {
                self.send_range(0..self.corpus.spans.len())?;
                self.drain()
            }
            ScenarioKind::Burst { bursts, burst_size } => {
                let burst_size = burst_size as usize;
                for burst in 0..bursts as usize {
                    let start = burst * burst_size;
                    self.send_range(start..start + burst_size)?;
                    self.drain()?;
                }
                Ok(())
            }
        }
    }

    fn send_range(&mut self, range: Range<usize>) -> SimResult<()> {
        for index in range {
            let message = self.corpus.message(index);
            loop {
                match self.link.primary().send(self.channel, message) {
                    Ok(()) => break,
                    Err(SendError::PoolExhausted(_)) => self.make_progress()?,
                    Err(err) => return Err(err.into()),
                }
            }
            self.sent += 1;
            if let Some(snap) = self.link.primary().snapshot(self.channel) {
                self.max_outstanding = self.max_outstanding.max(snap.in_flight + snap.pending);
            }
        }
        Ok(())
    }

    fn drain(&mut self) -> SimResult<()> {
        while self.completed.len() < self.sent {
            self.make_progress()?;
        }
        Ok(())
    }

    /// Steps until something moves, or reports a stall.
    fn make_progress(&mut self) -> SimResult<()> {
        let mut idle = 0;
        loop {
            if self.step()? {
                return Ok(());
            }
            idle += 1;
            let stalled = if self.threaded {
                self.started.elapsed() > THREADED_DEADLINE
            } else {
                idle > IDLE_STEPS
            };
            if stalled {
                return Err(SimError::Stalled {
                    completed: self.completed.len(),
                    expected: self.sent,
                });
            }
        }
    }

    fn step(&mut self) -> SimResult<bool> {
        let mut progressed = false;
        if !self.threaded {
            progressed |= self.link.pump()? > 0;
        }
        progressed |= self.service_receiver();
        progressed |= self.collect();
        if self.threaded && !progressed {
            match self.completions.recv_timeout(Duration::from_millis(1)) {
                Ok(buf) => {
                    self.record_completion(buf);
                    progressed = true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("completion handler dropped");
                }
            }
        }
        Ok(progressed)
    }

    /// Plays the receiving application: resumes partial messages and
    /// acknowledges batches on flow-controlled channels.
    fn service_receiver(&self) -> bool {
        let table = self.link.secondary();
        let Some(snap) = table.snapshot(self.channel) else {
            return false;
        };
        if snap.continuation.is_some() {
            table.start_recv(self.channel);
            table
                .snapshot(self.channel)
                .is_some_and(|after| after.continuation != snap.continuation)
        } else if snap.awaiting_done {
            table.rx_done(self.channel);
            true
        } else {
            false
        }
    }

    fn collect(&mut self) -> bool {
        let mut any = false;
        for chunk in self.deliveries.try_iter() {
            self.received.extend_from_slice(&chunk);
            any = true;
        }
        while let Ok(buf) = self.completions.try_recv() {
            self.record_completion(buf);
            any = true;
        }
        any
    }

    fn record_completion(&mut self, buf: &'static [u8]) {
        match self.corpus.index_of(buf) {
            Some(index) => self.completed.push(index),
            None => tracing::warn!("completion for a buffer outside the corpus"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_is_seeded_and_indexable() {
        let a = Corpus::generate(20, 7);
        let b = Corpus::generate(20, 7);
        assert_eq!(a.bytes, b.bytes);
        for index in 0..20 {
            let message = a.message(index);
            assert!((MIN_MESSAGE..=MAX_MESSAGE).contains(&message.len()));
            assert_eq!(&message[..4], &(index as u32).to_le_bytes());
            assert_eq!(a.index_of(message), Some(index));
        }
        assert_eq!(a.index_of(b.message(0)), None);
    }

    #[test]
    fn message_counts_follow_the_kind() {
        assert_eq!(ScenarioKind::flood(9).message_count(), 9);
        assert_eq!(ScenarioKind::burst(3, 4).message_count(), 12);
        assert_eq!(ScenarioKind::backpressure(5).name(), "backpressure");
    }

    #[test]
    fn pumped_flood_delivers_everything() {
        let config = ScenarioConfig::new(ScenarioKind::flood(40));
        let report = run(&config).expect("run");
        assert_eq!(report.completed, (0..40).collect::<Vec<_>>());
        assert_eq!(report.received, report.expected);
        assert!(!report.wake_held);
    }
}
