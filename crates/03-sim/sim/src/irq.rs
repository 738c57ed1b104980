use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use corelink_transport::CoreSide;

use crate::bank::DoorbellBank;
use crate::error::{SimError, SimResult};
use crate::link::SimTable;
use crate::wait;

/// A thread standing in for one core's interrupt vector.
///
/// Dispatches fireable doorbells to the table one at a time, so a line never
/// re-enters its own handler, and parks on the bank's interrupt word when
/// nothing is pending. Stops and joins on drop.
pub struct IrqThread {
    side: CoreSide,
    stop: Arc<AtomicBool>,
    bank: Arc<DoorbellBank>,
    handle: Option<JoinHandle<u64>>,
}

impl IrqThread {
    pub fn spawn(table: Arc<SimTable>, bank: Arc<DoorbellBank>, side: CoreSide) -> SimResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let bank = Arc::clone(&bank);
            thread::Builder::new()
                .name(format!("irq-{side:?}").to_lowercase())
                .spawn(move || service(&table, &bank, side, &stop))
                .map_err(SimError::Spawn)?
        };
        Ok(Self {
            side,
            stop,
            bank,
            handle: Some(handle),
        })
    }

    pub fn side(&self) -> CoreSide {
        self.side
    }

    /// Stops the thread and returns how many interrupts it dispatched.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        self.bank.kick(self.side);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(dispatched)) => dispatched,
            Some(Err(_)) => {
                tracing::error!("{:?} interrupt thread panicked", self.side);
                0
            }
            None => 0,
        }
    }
}

impl Drop for IrqThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown();
        }
    }
}

fn service(table: &SimTable, bank: &DoorbellBank, side: CoreSide, stop: &AtomicBool) -> u64 {
    let word = bank.irq_word(side);
    let mut dispatched = 0;
    loop {
        let seen = word.load(Ordering::Acquire);
        if stop.load(Ordering::Acquire) {
            break;
        }
        let lines = bank.fireable(side);
        if lines.is_empty() {
            wait::wait_while(word, seen);
            continue;
        }
        for (channel, event) in lines {
            if bank.is_fireable(side, channel, event) {
                table.on_doorbell(channel, event);
                dispatched += 1;
            }
        }
    }
    tracing::debug!("{side:?} interrupt thread exiting after {dispatched} dispatches");
    dispatched
}
