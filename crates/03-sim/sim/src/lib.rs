//! Host simulation of a two-core link.
//!
//! Stands in for the hardware the link is written against: a
//! [`DoorbellBank`] holding both cores' interrupt lines, a [`SimWakeLock`]
//! per core, and [`SimLink`] wiring two channel tables over one shared
//! region. Interrupts are either pumped deterministically on the calling
//! thread or serviced by an [`IrqThread`] per core. [`scenario`] drives
//! canned traffic through either mode and [`checks`] validates the result.

mod bank;
pub mod checks;
mod error;
mod irq;
mod link;
pub mod scenario;
mod wait;
mod wake;

pub use bank::{DoorbellBank, FireableLines, SimDoorbell};
pub use checks::{verify, verify_backpressure, verify_burst, verify_flood, CheckResult};
pub use error::{SimError, SimResult};
pub use irq::IrqThread;
pub use link::{SimLink, SimTable, PUMP_ROUND_LIMIT};
pub use scenario::{run, ScenarioConfig, ScenarioKind, ScenarioReport};
pub use wake::SimWakeLock;
