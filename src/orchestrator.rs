//! The request queue and convergence cycles.
//!
//! Requests arrive from any number of connections. At most one cycle drives
//! the devices at a time; requests that arrive meanwhile are queued and
//! drained, in order, by the running cycle. A cycle sweeps over every device
//! until all of them report done or the sweep budget runs out.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};

use crate::config::QuietHours;
use crate::device::Device;
use crate::errors::Error;
use crate::request::{BatchRequest, Plan, Request};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::roster::{Member, Roster};
use crate::runtime::{Mutex, TimedOut};
use crate::types::{ColorToken, Priority};

type Result<T> = std::result::Result<T, Error>;

/// Requests accepted while a cycle is locked before the next one forces a new cycle.
const LOCKOUT_LIMIT: u8 = 2;
/// Concurrent device writes in threaded mode.
const POOL_SIZE: usize = 4;

const SWEEPS: RetryPolicy = RetryPolicy::new(5);
const THREADED_WRITE: RetryPolicy = RetryPolicy::new(1).with_attempt_timeout(Duration::from_secs(5));
const STREAM_WRITES: RetryPolicy = RetryPolicy::new(4).with_delay(Duration::from_millis(300));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub threaded: bool,
    pub quiet_hours: Option<QuietHours>,
}

/// What happened to a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Refused by the time gate
    Dropped,
    /// Left for the running cycle to apply
    Queued,
    /// Applied by a cycle run in this call
    Applied,
}

/// The devices a stream of single-token writes goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    Device(usize),
    Group(String),
}

impl fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTarget::Device(index) => write!(f, "device {index}"),
            StreamTarget::Group(group) => write!(f, "group {group}"),
        }
    }
}

#[derive(Debug, Default)]
struct Queue {
    pending: VecDeque<Request>,
    locked: bool,
    lockout: u8,
}

pub struct Orchestrator {
    devices: Vec<Arc<Mutex<Device>>>,
    roster: Roster,
    descriptions: Vec<String>,
    queue: Mutex<Queue>,
    settings: Settings,
}

impl Orchestrator {
    /// Take ownership of `devices`. Their order defines the request indices.
    pub fn new(devices: Vec<Device>, settings: Settings) -> Self {
        let roster = Roster::new(devices.iter().map(Member::from).collect());
        let descriptions = devices
            .iter()
            .enumerate()
            .map(|(index, device)| format!("{}. {}", index, device.describe()))
            .collect();

        Orchestrator {
            devices: devices
                .into_iter()
                .map(|device| Arc::new(Mutex::new(device)))
                .collect(),
            roster,
            descriptions,
            queue: Mutex::new(Queue::default()),
            settings,
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// One line per device, in index order.
    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    /// The on-wire color of every device, in index order.
    pub async fn query_state(&self) -> Vec<String> {
        let mut state = Vec::with_capacity(self.devices.len());
        for device in &self.devices {
            state.push(device.lock().await.current_color().to_string());
        }
        state
    }

    /// Validate a client batch request against the current fleet.
    pub async fn plan(&self, batch: &BatchRequest) -> Result<Plan> {
        let current = self.query_state().await;
        batch.plan(&self.roster, &current)
    }

    /// Submit a request. Returns once it is applied, queued or dropped.
    ///
    /// The caller that finds no cycle running runs one itself, draining the
    /// queue including requests added by others in the meantime.
    pub async fn apply_request(&self, request: Request) -> Result<Dispatch> {
        if request.len() != self.devices.len() {
            return Err(Error::invalid_request(format!(
                "got {} tokens, {} devices configured",
                request.len(),
                self.devices.len()
            )));
        }
        if !self.time_allows(&request) {
            debug!("Too soon, no change of light required");
            return Ok(Dispatch::Dropped);
        }

        {
            let mut queue = self.queue.lock().await;
            queue.pending.push_back(request);
            debug!("Locked status: {}", queue.locked);

            if queue.locked {
                if queue.lockout < LOCKOUT_LIMIT {
                    queue.lockout += 1;
                    debug!("Cycle running, request queued");
                    return Ok(Dispatch::Queued);
                }
                warn!(
                    "Cycle still locked after {} queued requests, forcing a new one",
                    LOCKOUT_LIMIT
                );
            }
            queue.locked = true;
            queue.lockout = 0;
        }

        self.run_cycle().await;
        Ok(Dispatch::Applied)
    }

    fn time_allows(&self, request: &Request) -> bool {
        if request.bypasses_quiet_hours() {
            return true;
        }
        match &self.settings.quiet_hours {
            Some(quiet) => !quiet.contains(Local::now().time()),
            None => true,
        }
    }

    async fn run_cycle(&self) {
        info!("Running a change of lights...");
        let mut first = true;
        while let Some(request) = self.next_request().await {
            if !first {
                debug!("Getting remainder of queue");
                self.reset_all().await;
            }
            first = false;
            self.converge(&request).await;
        }
        info!("Change of lights completed.");
    }

    // Popping and unlocking happen under the same queue lock, so a request
    // pushed concurrently is either popped here or starts its own cycle.
    async fn next_request(&self) -> Option<Request> {
        let mut queue = self.queue.lock().await;
        if let Some(request) = queue.pending.pop_front() {
            return Some(request);
        }
        self.reset_all().await;
        queue.locked = false;
        None
    }

    async fn converge(&self, request: &Request) -> RetryOutcome {
        debug!(
            "Changing colors to {:?} with priority {}",
            request.tokens(),
            request.priority().value()
        );

        let outcome = SWEEPS.run(move |_| self.sweep(request)).await;
        match outcome {
            RetryOutcome::Succeeded { attempts } => {
                debug!("All devices done after {} sweep(s)", attempts);
            }
            RetryOutcome::Exhausted { attempts } => {
                let stragglers = self.stragglers().await;
                error!(
                    "Giving up on devices {:?} after {} sweeps",
                    stragglers, attempts
                );
            }
        }
        outcome
    }

    /// One pass over every device. Returns whether all of them are done.
    async fn sweep(&self, request: &Request) -> bool {
        if self.settings.threaded {
            self.sweep_concurrently(request).await;
        } else {
            self.sweep_in_order(request).await;
        }
        self.stragglers().await.is_empty()
    }

    async fn sweep_in_order(&self, request: &Request) {
        for (device, token) in self.devices.iter().zip(request.tokens()) {
            let mut device = device.lock().await;
            Self::step(&mut device, token, request.priority()).await;
        }
    }

    // A write that outlives its timeout is cancelled and the device's link
    // closed. Returns the indices of those devices.
    async fn sweep_concurrently(&self, request: &Request) -> Vec<usize> {
        let priority = request.priority();
        let jobs: Vec<(Arc<Mutex<Device>>, ColorToken)> = self
            .devices
            .iter()
            .cloned()
            .zip(request.tokens().iter().cloned())
            .collect();

        let timed_out: Vec<usize> = stream::iter(jobs)
            .map(move |(device, token)| async move {
                let written = THREADED_WRITE
                    .attempt(async {
                        let mut guard = device.lock().await;
                        Self::step(&mut guard, &token, priority).await
                    })
                    .await;
                (device, written)
            })
            .buffer_unordered(POOL_SIZE)
            .filter_map(|(device, written)| async move {
                match written {
                    Ok(_) => None,
                    Err(TimedOut) => {
                        let mut device = device.lock().await;
                        device.disconnect().await;
                        Some(device.index())
                    }
                }
            })
            .collect()
            .await;

        if !timed_out.is_empty() {
            warn!("Device writes timed out: {:?}", timed_out);
        }
        timed_out
    }

    async fn step(device: &mut Device, token: &ColorToken, priority: Priority) -> bool {
        if device.is_converged() {
            return true;
        }
        let target = device.convert(token);
        debug!(
            "DEVICE: {}, REQUESTED COLOR: {}, FROM STATE: {}, PRIORITY: {}",
            device.index(),
            target,
            device.current_color(),
            priority.value()
        );
        device.color(&target, priority).await.is_done()
    }

    async fn stragglers(&self) -> Vec<usize> {
        let mut pending = Vec::new();
        for device in &self.devices {
            let device = device.lock().await;
            if !device.is_converged() {
                pending.push(device.index());
            }
        }
        pending
    }

    async fn reset_all(&self) {
        for device in &self.devices {
            device.lock().await.reset();
        }
    }

    /// Write one token to a device or group outside the queue.
    ///
    /// Streamed colors are transient: they never block a later queued
    /// request. Each device gets a few attempts.
    pub async fn stream_write(&self, target: &StreamTarget, token: &ColorToken) -> Result<()> {
        let indices = match target {
            StreamTarget::Device(index) if *index < self.devices.len() => vec![*index],
            StreamTarget::Device(index) => return Err(Error::DeviceNotFound(*index)),
            StreamTarget::Group(group) => self.roster.group_members(group),
        };
        if indices.is_empty() {
            warn!("No device in {}", target);
        }

        for index in indices {
            let device = Arc::clone(&self.devices[index]);
            let outcome = STREAM_WRITES
                .run(|_| {
                    let device = Arc::clone(&device);
                    let token = token.clone();
                    async move {
                        let mut device = device.lock().await;
                        let target = device.convert(&token);
                        device.color(&target, Priority::transient()).await.is_done()
                    }
                })
                .await;
            device.lock().await.reset();

            if !outcome.succeeded() {
                warn!(
                    "Streaming {} to device {} failed after {} attempts",
                    token,
                    index,
                    outcome.attempts()
                );
            }
        }
        Ok(())
    }

    /// Close every hardware connection.
    pub async fn disconnect_all(&self) {
        for device in &self.devices {
            device.lock().await.disconnect().await;
        }
    }
}
