//! Per-register polling cadence.
//!
//! The poll list is fixed at startup. On every pass the scheduler checks
//! each entry against its period and enqueues the register's address for
//! transmission when it is due. The pass runs continuously and cheaply; the
//! cadence granularity is bounded by how often the pass itself runs, not by
//! a precise timer.

use crate::queue::TxQueue;
use crate::registry;
use std::time::{Duration, Instant};
use tracing::trace;

/// One monitored register: what to poll and whether decoded responses
/// should be republished.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub name: &'static str,
    pub publish: bool,
    pub period: Duration,
}

/// The register set the reference deployment polls. Periods much below two
/// seconds can stop the device's automatic TEXT output.
pub fn default_poll_list(period: Duration) -> Vec<PollConfig> {
    ["soc", "current_coarse", "consumed_ah", "main_voltage"]
        .into_iter()
        .map(|name| PollConfig {
            name,
            publish: true,
            period,
        })
        .collect()
}

struct PollEntry {
    config: PollConfig,
    last_polled: Option<Instant>,
}

pub struct Scheduler {
    entries: Vec<PollEntry>,
}

impl Scheduler {
    pub fn new(poll_list: Vec<PollConfig>) -> Self {
        let entries = poll_list
            .into_iter()
            .map(|config| PollEntry {
                config,
                last_polled: None,
            })
            .collect();
        Self { entries }
    }

    /// One scheduling pass: enqueue every register whose period has elapsed.
    /// A name missing from the HEX catalog is a poll-list typo and is
    /// skipped silently.
    pub fn sweep(&mut self, now: Instant, queue: &TxQueue) {
        for entry in &mut self.entries {
            let due = match entry.last_polled {
                None => true,
                Some(last) => now.duration_since(last) >= entry.config.period,
            };
            if due {
                entry.last_polled = Some(now);
                if let Some(reg) = registry::hex_by_name(entry.config.name) {
                    trace!(name = entry.config.name, address = reg.address, "poll due");
                    queue.push(reg.address);
                }
            }
        }
    }
}

#[test]
fn test_first_sweep_enqueues_everything() {
    let queue = TxQueue::new(32);
    let mut scheduler = Scheduler::new(default_poll_list(Duration::from_secs(3)));
    scheduler.sweep(Instant::now(), &queue);
    assert_eq!(queue.len(), 4);
}

#[test]
fn test_at_most_once_per_period() {
    let queue = TxQueue::new(32);
    let mut scheduler = Scheduler::new(vec![PollConfig {
        name: "soc",
        publish: true,
        period: Duration::from_secs(3),
    }]);

    let t0 = Instant::now();
    scheduler.sweep(t0, &queue);
    // Many passes inside the window enqueue nothing further
    scheduler.sweep(t0 + Duration::from_millis(100), &queue);
    scheduler.sweep(t0 + Duration::from_secs(1), &queue);
    scheduler.sweep(t0 + Duration::from_millis(2999), &queue);
    assert_eq!(queue.len(), 1);

    scheduler.sweep(t0 + Duration::from_secs(3), &queue);
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop(), Some(0x0FFF));
}

#[test]
fn test_unknown_name_skipped() {
    let queue = TxQueue::new(32);
    let mut scheduler = Scheduler::new(vec![PollConfig {
        name: "not_a_register",
        publish: true,
        period: Duration::from_secs(3),
    }]);
    scheduler.sweep(Instant::now(), &queue);
    assert!(queue.is_empty());
}
