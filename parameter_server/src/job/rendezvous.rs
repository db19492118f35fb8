use std::{collections::HashMap, error::Error, fmt};

use comms::specs::ScheduleResponse;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Errors of the `Rendezvous` registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousErr {
    /// No job with this id is running in this parameter server.
    UnknownJob(String),
    /// The job already has a schedule request waiting for its answer.
    AlreadyPending(String),
}

impl fmt::Display for RendezvousErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendezvousErr::UnknownJob(id) => write!(f, "unknown job {id}"),
            RendezvousErr::AlreadyPending(id) => {
                write!(f, "job {id} already waits for a schedule response")
            }
        }
    }
}

impl Error for RendezvousErr {}

/// What happened to a delivered schedule response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the waiting coordinator.
    Delivered,
    /// The job is known but nobody waits for an answer anymore.
    Dropped,
}

/// Hands schedule responses to the coordinator waiting for them.
///
/// Every job owns one slot, holding at most one pending request at a time.
#[derive(Debug, Default)]
pub struct Rendezvous {
    slots: Mutex<HashMap<String, Option<oneshot::Sender<ScheduleResponse>>>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the empty slot of a job.
    pub fn register(&self, job_id: &str) {
        self.slots.lock().insert(job_id.to_string(), None);
    }

    /// Opens a pending request for the job.
    ///
    /// # Returns
    /// The receiving end of the response, or an error if the job is unknown or
    /// already has a pending request.
    pub fn arm(&self, job_id: &str) -> Result<oneshot::Receiver<ScheduleResponse>, RendezvousErr> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(job_id)
            .ok_or_else(|| RendezvousErr::UnknownJob(job_id.to_string()))?;

        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(RendezvousErr::AlreadyPending(job_id.to_string()));
        }

        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        Ok(rx)
    }

    /// Delivers a response to the job's pending request, if any.
    pub fn deliver(&self, job_id: &str, response: ScheduleResponse) -> Result<Delivery, RendezvousErr> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(job_id)
            .ok_or_else(|| RendezvousErr::UnknownJob(job_id.to_string()))?;

        match slot.take() {
            Some(tx) => match tx.send(response) {
                Ok(()) => Ok(Delivery::Delivered),
                Err(_) => Ok(Delivery::Dropped),
            },
            None => Ok(Delivery::Dropped),
        }
    }

    /// Abandons the job's pending request, a late response will be dropped.
    pub fn disarm(&self, job_id: &str) {
        if let Some(slot) = self.slots.lock().get_mut(job_id) {
            slot.take();
        }
    }

    /// Forgets the job, waking a pending request with a closed channel.
    pub fn release(&self, job_id: &str) -> bool {
        self.slots.lock().remove(job_id).is_some()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.slots.lock().contains_key(job_id)
    }
}
