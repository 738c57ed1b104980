use crate::scenario::{ScenarioKind, ScenarioReport};

pub type CheckResult = Result<(), String>;

/// Every message completed once, in send order, and the receiver saw the
/// exact byte stream.
pub fn verify_flood(report: &ScenarioReport) -> CheckResult {
    if report.completed.len() != report.messages {
        return Err(format!(
            "completed {} messages (expected {})",
            report.completed.len(),
            report.messages
        ));
    }
    if let Some((position, &index)) = report
        .completed
        .iter()
        .enumerate()
        .find(|&(position, &index)| position != index)
    {
        return Err(format!(
            "completion {position} was message {index}; completions out of order"
        ));
    }
    if report.received.len() != report.expected.len() {
        return Err(format!(
            "received {} bytes (expected {})",
            report.received.len(),
            report.expected.len()
        ));
    }
    if let Some(offset) = report
        .received
        .iter()
        .zip(report.expected)
        .position(|(got, want)| got != want)
    {
        return Err(format!("received stream diverges at byte {offset}"));
    }
    if report.sender.completed as usize != report.messages {
        return Err(format!(
            "sender counted {} completions (expected {})",
            report.sender.completed, report.messages
        ));
    }
    if report.wake_held {
        return Err("sender still holds its wake lock after draining".into());
    }
    if report.wake_acquires != report.wake_releases {
        return Err(format!(
            "wake lock acquired {} times but released {} times",
            report.wake_acquires, report.wake_releases
        ));
    }
    Ok(())
}

/// Flood checks plus: the sender never held more than `slot_budget`
/// descriptors, and the wake lock was dropped between bursts.
pub fn verify_burst(report: &ScenarioReport, slot_budget: usize) -> CheckResult {
    verify_flood(report)?;
    if report.max_outstanding > slot_budget {
        return Err(format!(
            "{} messages outstanding exceeded the {} descriptor budget",
            report.max_outstanding, slot_budget
        ));
    }
    if let ScenarioKind::Burst { bursts, burst_size } = report.kind {
        if burst_size > 0 && report.wake_acquires < u64::from(bursts) {
            return Err(format!(
                "wake lock acquired {} times over {bursts} bursts",
                report.wake_acquires
            ));
        }
    }
    Ok(())
}

/// Flood checks plus: the receiver actually parked partial messages.
pub fn verify_backpressure(report: &ScenarioReport) -> CheckResult {
    verify_flood(report)?;
    if report.messages > 0 && report.receiver.partial == 0 {
        return Err("backpressure scenario never consumed a message partially".into());
    }
    Ok(())
}

/// Runs the checks matching the report's scenario.
pub fn verify(report: &ScenarioReport, slot_budget: usize) -> CheckResult {
    match report.kind {
        ScenarioKind::Flood { .. } => verify_flood(report),
        ScenarioKind::Burst { .. } => verify_burst(report, slot_budget),
        ScenarioKind::Backpressure { .. } => verify_backpressure(report),
    }
}
