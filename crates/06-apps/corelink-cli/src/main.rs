//! Runs canned traffic across a simulated two-core link and reports what
//! the link did.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use corelink::{LinkConfig, LinkKind};
use corelink_sim::{ScenarioConfig, ScenarioKind, ScenarioReport};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    Flood,
    Burst,
    Backpressure,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Link {
    AudioCore,
    Coprocessor,
    SensorHub,
}

impl From<Link> for LinkKind {
    fn from(link: Link) -> Self {
        match link {
            Link::AudioCore => LinkKind::AudioCore,
            Link::Coprocessor => LinkKind::Coprocessor,
            Link::SensorHub => LinkKind::SensorHub,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Inter-core message link simulator")]
struct Args {
    /// Traffic pattern to run
    #[arg(long, value_enum, default_value = "flood")]
    scenario: Scenario,

    /// Link preset supplying channel count, pool depth and wake reason
    #[arg(long, value_enum, default_value = "coprocessor")]
    link: Link,

    /// Messages to send (bursts for the burst scenario)
    #[arg(long, default_value_t = 1_000)]
    messages: u32,

    /// Messages per burst
    #[arg(long, default_value_t = 12)]
    burst_size: u32,

    /// Override the preset's descriptors per channel
    #[arg(long)]
    slots: Option<u16>,

    /// Require explicit receive acknowledgement
    #[arg(long)]
    flow_control: bool,

    /// Service each core's interrupts on its own thread
    #[arg(long)]
    threaded: bool,

    /// Seed for message sizes and partial consumption
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
}

fn main() -> Result<()> {
    init_tracing();

    let Args {
        scenario,
        link,
        messages,
        burst_size,
        slots,
        flow_control,
        threaded,
        seed,
    } = Args::parse();

    let mut link = LinkConfig::preset(link.into());
    if let Some(slots) = slots {
        link = link.with_slots(slots);
    }
    link.validate().context("invalid link configuration")?;

    let kind = match scenario {
        Scenario::Flood => ScenarioKind::flood(messages),
        Scenario::Burst => ScenarioKind::burst(messages, burst_size),
        Scenario::Backpressure => ScenarioKind::backpressure(messages),
    };
    let config = ScenarioConfig::new(kind)
        .with_link(link)
        .with_flow_control(flow_control)
        .threaded(threaded)
        .with_seed(seed);

    let report = corelink_sim::run(&config)
        .with_context(|| format!("{} scenario failed", kind.name()))?;
    print_summary(&report);

    if let Err(problem) = corelink_sim::verify(&report, link.slots_per_channel as usize) {
        warn!("verification failed: {problem}");
        bail!("{} scenario verification failed: {problem}", kind.name());
    }
    info!("{} scenario verified", kind.name());
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn print_summary(report: &ScenarioReport) {
    println!("scenario          {}", report.kind.name());
    println!("messages          {}", report.messages);
    println!("bytes             {}", report.expected.len());
    println!("completed         {}", report.completed.len());
    println!("received bytes    {}", report.received.len());
    println!("max outstanding   {}", report.max_outstanding);
    println!("pool exhausted    {}", report.sender.pool_exhausted);
    println!("partial receives  {}", report.receiver.partial);
    println!("resyncs           {}", report.sender.resyncs + report.receiver.resyncs);
    println!("send doorbells    {}", report.send_doorbells);
    println!("done doorbells    {}", report.done_doorbells);
    println!(
        "wake lock         {} acquires / {} releases",
        report.wake_acquires, report.wake_releases
    );
}
