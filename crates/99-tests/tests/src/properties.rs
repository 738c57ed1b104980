use std::sync::Arc;

use corelink::{ChannelId, CoreSide, Handlers, LinkConfig, SendError};
use corelink_sim::SimLink;
use parking_lot::Mutex;
use proptest::prelude::*;

const CHANNELS: usize = 3;
const SLOTS: u16 = 4;

static CORPUS: [u8; 256] = corpus();

const fn corpus() -> [u8; 256] {
    let mut out = [0u8; 256];
    let mut i = 0;
    while i < out.len() {
        out[i] = i as u8;
        i += 1;
    }
    out
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Send { channel: usize, len: usize },
    Pump,
    Service,
    StopRecv(usize),
    StartRecv(usize),
    PowerCycle(CoreSide),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..CHANNELS, 1usize..24).prop_map(|(channel, len)| Op::Send { channel, len }),
        3 => Just(Op::Pump),
        2 => Just(Op::Service),
        1 => (0..CHANNELS).prop_map(Op::StopRecv),
        1 => (0..CHANNELS).prop_map(Op::StartRecv),
        1 => prop_oneof![Just(CoreSide::Primary), Just(CoreSide::Secondary)].prop_map(Op::PowerCycle),
    ]
}

#[derive(Default)]
struct Stream {
    sent: Vec<&'static [u8]>,
    completed: Vec<&'static [u8]>,
    received: Vec<u8>,
}

struct Harness {
    link: SimLink,
    streams: Vec<Arc<Mutex<Stream>>>,
    cursor: usize,
}

impl Harness {
    fn new(flow_control: bool, chunk: Option<usize>) -> Self {
        let link = SimLink::new(
            LinkConfig::default()
                .with_channels(CHANNELS)
                .with_slots(SLOTS),
        )
        .expect("link");
        let streams: Vec<Arc<Mutex<Stream>>> = (0..CHANNELS).map(|_| Arc::default()).collect();
        for (raw, stream) in streams.iter().enumerate() {
            let ch = ChannelId::new(raw as u8);
            let sink = Arc::clone(stream);
            link.primary()
                .open(
                    ch,
                    Handlers::new().on_sent(move |buf| sink.lock().completed.push(buf)),
                    flow_control,
                )
                .expect("open primary");
            let sink = Arc::clone(stream);
            let mut calls = 0usize;
            link.secondary()
                .open(
                    ch,
                    Handlers::new().on_receive(move |buf| {
                        calls += 1;
                        let take = match chunk {
                            Some(chunk) => buf.len().min(1 + (calls * 7) % chunk.max(1)),
                            None => buf.len(),
                        };
                        sink.lock().received.extend_from_slice(&buf[..take]);
                        take
                    }),
                    flow_control,
                )
                .expect("open secondary");
        }
        Self {
            link,
            streams,
            cursor: 0,
        }
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::Send { channel, len } => {
                let start = self.cursor % (CORPUS.len() - len);
                self.cursor += len;
                let message = &CORPUS[start..start + len];
                match self.link.primary().send(ChannelId::new(channel as u8), message) {
                    Ok(()) => self.streams[channel].lock().sent.push(message),
                    Err(SendError::PoolExhausted(_)) => {}
                    Err(err) => panic!("unexpected send failure: {err}"),
                }
            }
            Op::Pump => {
                self.link.pump().expect("pump");
            }
            Op::Service => self.service(),
            Op::StopRecv(channel) => self.link.secondary().stop_recv(ChannelId::new(channel as u8)),
            Op::StartRecv(channel) => self.link.secondary().start_recv(ChannelId::new(channel as u8)),
            Op::PowerCycle(side) => self.link.power_cycle(side),
        }
    }

    fn service(&self) {
        let rx = self.link.secondary();
        for raw in 0..CHANNELS {
            let ch = ChannelId::new(raw as u8);
            let Some(snap) = rx.snapshot(ch) else { continue };
            if snap.continuation.is_some() {
                rx.start_recv(ch);
            } else if snap.awaiting_done {
                rx.rx_done(ch);
            }
        }
    }

    fn quiescent(&self) -> bool {
        (0..CHANNELS).all(|raw| {
            let ch = ChannelId::new(raw as u8);
            let tx = self.link.primary().snapshot(ch).expect("snapshot");
            let rx = self.link.secondary().snapshot(ch).expect("snapshot");
            tx.in_flight == 0 && tx.pending == 0 && rx.continuation.is_none() && !rx.awaiting_done
        })
    }

    fn settle(&mut self) {
        for raw in 0..CHANNELS {
            self.link.secondary().start_recv(ChannelId::new(raw as u8));
        }
        for _ in 0..10_000 {
            self.link.pump().expect("pump");
            if self.quiescent() {
                return;
            }
            self.service();
        }
        panic!("link never settled");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_channel_delivers_in_order_exactly_once(
        ops in prop::collection::vec(op(), 1..120),
        flow_control in any::<bool>(),
        chunk in prop::option::of(1usize..9),
    ) {
        let mut harness = Harness::new(flow_control, chunk);
        for op in ops {
            harness.apply(op);
        }
        harness.settle();

        for (raw, stream) in harness.streams.iter().enumerate() {
            let stream = stream.lock();
            let expected: Vec<u8> = stream.sent.iter().flat_map(|m| m.iter().copied()).collect();
            prop_assert_eq!(&stream.received, &expected, "channel {}", raw);
            prop_assert_eq!(stream.completed.len(), stream.sent.len());
            for (got, want) in stream.completed.iter().zip(&stream.sent) {
                prop_assert_eq!(got.as_ptr(), want.as_ptr());
                prop_assert_eq!(got.len(), want.len());
            }
        }
        prop_assert!(!harness.link.wake(CoreSide::Primary).held());
    }
}
