use std::sync::Arc;

use corelink::{ChannelId, CoreSide, Event, Handlers, LinkConfig};
use corelink_sim::SimLink;
use parking_lot::Mutex;

static FRAMES: [u8; 48] = *b"frame-00frame-01frame-02frame-03frame-04frame-05";

fn frame(index: usize) -> &'static [u8] {
    &FRAMES[index * 8..index * 8 + 8]
}

struct Pair {
    link: SimLink,
    received: Arc<Mutex<Vec<u8>>>,
    completed: Arc<Mutex<usize>>,
}

fn pair(flow_control: bool) -> Pair {
    let link = SimLink::new(LinkConfig::default().with_channels(2)).expect("link");
    let received: Arc<Mutex<Vec<u8>>> = Arc::default();
    let completed: Arc<Mutex<usize>> = Arc::default();
    let ch = ChannelId::new(0);

    let sink = Arc::clone(&completed);
    link.primary()
        .open(ch, Handlers::new().on_sent(move |_| *sink.lock() += 1), flow_control)
        .expect("open primary");
    let sink = Arc::clone(&received);
    link.secondary()
        .open(
            ch,
            Handlers::new().on_receive(move |buf| {
                sink.lock().extend_from_slice(buf);
                buf.len()
            }),
            flow_control,
        )
        .expect("open secondary");
    Pair {
        link,
        received,
        completed,
    }
}

#[test]
fn indication_sent_while_receiver_sleeps_survives_resync() {
    let Pair {
        link,
        received,
        completed,
    } = pair(false);
    let ch = ChannelId::new(0);

    link.bank().power_loss(CoreSide::Secondary);
    link.primary().send(ch, frame(0)).expect("send");
    assert_eq!(link.pump().expect("pump"), 0, "masked core must not fire");
    assert!(link.bank().is_raised(CoreSide::Secondary, ch, Event::Send));

    link.secondary().power_resync();
    link.pump().expect("pump");
    assert_eq!(&received.lock()[..], frame(0));
    assert_eq!(*completed.lock(), 1);
    assert!(!link.wake(CoreSide::Primary).held());
}

#[test]
fn completion_sent_while_sender_sleeps_survives_resync() {
    let Pair {
        link, completed, ..
    } = pair(false);
    let ch = ChannelId::new(0);

    link.primary().send(ch, frame(1)).expect("send");
    link.bank().power_loss(CoreSide::Primary);
    link.pump().expect("pump");
    assert_eq!(*completed.lock(), 0);
    assert!(link.wake(CoreSide::Primary).held(), "message still outstanding");

    link.power_cycle(CoreSide::Primary);
    link.pump().expect("pump");
    assert_eq!(*completed.lock(), 1);
    assert!(!link.wake(CoreSide::Primary).held());
}

#[test]
fn resync_keeps_flow_controlled_receiver_parked() {
    let Pair {
        link,
        received,
        completed,
    } = pair(true);
    let ch = ChannelId::new(0);

    link.primary().send(ch, frame(2)).expect("send");
    link.primary().send(ch, frame(3)).expect("send");
    link.pump().expect("pump");
    assert_eq!(&received.lock()[..], frame(2));

    link.power_cycle(CoreSide::Secondary);
    assert!(link.bank().is_masked(CoreSide::Secondary, ch, Event::Send));

    link.secondary().rx_done(ch);
    link.pump().expect("pump");
    link.secondary().rx_done(ch);
    link.pump().expect("pump");

    let mut expected = frame(2).to_vec();
    expected.extend_from_slice(frame(3));
    assert_eq!(&received.lock()[..], &expected[..]);
    assert_eq!(*completed.lock(), 2);
}

#[test]
fn closed_channels_stay_masked_after_resync() {
    let Pair { link, .. } = pair(false);
    let idle = ChannelId::new(1);
    for side in CoreSide::BOTH {
        link.power_cycle(side);
        assert!(link.bank().is_masked(side, idle, Event::Send));
        assert!(link.bank().is_masked(side, idle, Event::RecvDone));
    }
}

#[test]
fn repeated_power_cycles_mid_stream_lose_nothing() {
    let Pair {
        link,
        received,
        completed,
    } = pair(false);
    let ch = ChannelId::new(0);

    for index in 0..6 {
        link.primary().send(ch, frame(index)).expect("send");
        let side = if index % 2 == 0 {
            CoreSide::Secondary
        } else {
            CoreSide::Primary
        };
        link.bank().power_loss(side);
        link.pump().expect("pump");
        link.table(side).power_resync();
    }
    link.pump().expect("pump");

    assert_eq!(&received.lock()[..], &FRAMES[..]);
    assert_eq!(*completed.lock(), 6);
}
