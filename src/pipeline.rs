use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::state::Cadet;

pub const ALL: &str = "all";
pub const TOP_PERFORMER_RANK: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub search: String,
    pub platoon: String,
    pub squad: String,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search: String::new(),
            platoon: ALL.to_string(),
            squad: ALL.to_string(),
        }
    }
}

impl FilterCriteria {
    pub fn matches(&self, cadet: &Cadet) -> bool {
        self.matches_lowered(cadet, &self.search.to_lowercase())
    }

    fn matches_lowered(&self, cadet: &Cadet, needle: &str) -> bool {
        cadet.name.to_lowercase().contains(needle)
            && (self.platoon == ALL || cadet.platoon == self.platoon)
            && (self.squad == ALL || cadet.squad.to_string() == self.squad)
    }

    pub fn is_wildcard(&self) -> bool {
        self.search.trim().is_empty() && self.platoon == ALL && self.squad == ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    Score,
    Rank,
    Study,
    Discipline,
    Events,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Score => "score",
            SortKey::Rank => "rank",
            SortKey::Study => "study",
            SortKey::Discipline => "discipline",
            SortKey::Events => "events",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatoonStats {
    pub count: usize,
    pub total_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadetStatistics {
    pub total_cadets: usize,
    pub average_score: f64,
    pub top_performers: Vec<Cadet>,
    pub platoon_stats: BTreeMap<String, PlatoonStats>,
}

#[derive(Debug, Clone)]
pub enum PipelineCommand {
    Filter {
        cadets: Vec<Cadet>,
        criteria: FilterCriteria,
    },
    Sort {
        cadets: Vec<Cadet>,
        sort_by: SortKey,
    },
    Statistics {
        cadets: Vec<Cadet>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResponse {
    Filtered(Vec<Cadet>),
    Sorted(Vec<Cadet>),
    Statistics(CadetStatistics),
}

impl PipelineResponse {
    pub fn into_cadets(self) -> Option<Vec<Cadet>> {
        match self {
            PipelineResponse::Filtered(cadets) | PipelineResponse::Sorted(cadets) => Some(cadets),
            PipelineResponse::Statistics(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Worker,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Completed {
    pub seq: u64,
    pub response: PipelineResponse,
    pub path: ExecutionPath,
}

pub fn filter_cadets(cadets: &[Cadet], criteria: &FilterCriteria) -> Vec<Cadet> {
    let needle = criteria.search.to_lowercase();
    cadets
        .iter()
        .filter(|cadet| criteria.matches_lowered(cadet, &needle))
        .cloned()
        .collect()
}

/// Stable: cadets that compare equal keep their input order.
pub fn sort_cadets(cadets: &mut [Cadet], sort_by: SortKey) {
    match sort_by {
        SortKey::Name => cadets.sort_by_cached_key(|c| c.name.to_lowercase()),
        SortKey::Score => cadets.sort_by(|a, b| b.total_score.cmp(&a.total_score)),
        SortKey::Rank => cadets.sort_by_key(|c| c.rank),
        SortKey::Study => cadets.sort_by(|a, b| b.scores.study.cmp(&a.scores.study)),
        SortKey::Discipline => {
            cadets.sort_by(|a, b| b.scores.discipline.cmp(&a.scores.discipline))
        }
        SortKey::Events => cadets.sort_by(|a, b| b.scores.events.cmp(&a.scores.events)),
    }
}

pub fn compute_statistics(cadets: &[Cadet]) -> CadetStatistics {
    let total: i64 = cadets.iter().map(|c| c.total_score).sum();
    let average_score = if cadets.is_empty() {
        0.0
    } else {
        total as f64 / cadets.len() as f64
    };

    let mut platoon_stats: BTreeMap<String, PlatoonStats> = BTreeMap::new();
    for cadet in cadets {
        let entry = platoon_stats
            .entry(cadet.platoon.clone())
            .or_insert(PlatoonStats {
                count: 0,
                total_score: 0,
            });
        entry.count += 1;
        entry.total_score += cadet.total_score;
    }

    CadetStatistics {
        total_cadets: cadets.len(),
        average_score,
        top_performers: cadets
            .iter()
            .filter(|c| c.rank <= TOP_PERFORMER_RANK)
            .cloned()
            .collect(),
        platoon_stats,
    }
}

/// Runs a command in the calling thread. The worker calls exactly this, so both
/// execution paths agree by construction.
pub fn execute(command: PipelineCommand) -> PipelineResponse {
    match command {
        PipelineCommand::Filter { cadets, criteria } => {
            PipelineResponse::Filtered(filter_cadets(&cadets, &criteria))
        }
        PipelineCommand::Sort {
            mut cadets,
            sort_by,
        } => {
            sort_cadets(&mut cadets, sort_by);
            PipelineResponse::Sorted(cadets)
        }
        PipelineCommand::Statistics { cadets } => {
            PipelineResponse::Statistics(compute_statistics(&cadets))
        }
    }
}

struct Job {
    seq: u64,
    command: PipelineCommand,
    reply: Sender<(u64, PipelineResponse)>,
}

struct Worker {
    tx: Sender<Job>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("rating-pipeline".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    let response = execute(job.command);
                    // The requester may have moved on; a closed reply channel is fine.
                    let _ = job.reply.send((job.seq, response));
                }
            })
            .context("failed to spawn pipeline worker")?;
        Ok(Self { tx, handle })
    }
}

/// Pending result of a dispatched command.
///
/// If the worker never answers (it was torn down, or it panicked while running
/// the command) the ticket recomputes the command in the calling thread.
pub struct Ticket {
    seq: u64,
    state: TicketState,
}

enum TicketState {
    Pending {
        rx: Receiver<(u64, PipelineResponse)>,
        fallback: PipelineCommand,
    },
    Ready(Completed),
    Taken,
}

impl Ticket {
    fn ready(seq: u64, command: PipelineCommand) -> Self {
        Ticket {
            seq,
            state: TicketState::Ready(Completed {
                seq,
                response: execute(command),
                path: ExecutionPath::Fallback,
            }),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Non-blocking. Returns the result once, then `None` forever.
    pub fn poll(&mut self) -> Option<Completed> {
        let received = match &self.state {
            TicketState::Pending { rx, .. } => rx.try_recv(),
            TicketState::Ready(_) | TicketState::Taken => return self.take_ready(),
        };
        match received {
            Ok((seq, response)) => {
                self.state = TicketState::Taken;
                Some(Completed {
                    seq,
                    response,
                    path: ExecutionPath::Worker,
                })
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.take_fallback(),
        }
    }

    /// Blocks up to `timeout`; a worker that does not answer in time is treated as failed.
    pub fn wait(mut self, timeout: Duration) -> Option<Completed> {
        let received = match &self.state {
            TicketState::Pending { rx, .. } => rx.recv_timeout(timeout),
            TicketState::Ready(_) | TicketState::Taken => return self.take_ready(),
        };
        match received {
            Ok((seq, response)) => Some(Completed {
                seq,
                response,
                path: ExecutionPath::Worker,
            }),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                self.take_fallback()
            }
        }
    }

    fn take_ready(&mut self) -> Option<Completed> {
        match std::mem::replace(&mut self.state, TicketState::Taken) {
            TicketState::Ready(done) => Some(done),
            _ => None,
        }
    }

    fn take_fallback(&mut self) -> Option<Completed> {
        match std::mem::replace(&mut self.state, TicketState::Taken) {
            TicketState::Pending { fallback, .. } => Some(Completed {
                seq: self.seq,
                response: execute(fallback),
                path: ExecutionPath::Fallback,
            }),
            TicketState::Ready(done) => Some(done),
            TicketState::Taken => None,
        }
    }
}

/// Owner of one background worker. Dropping it releases the worker.
pub struct Pipeline {
    worker: Option<Worker>,
    next_seq: u64,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("background", &self.worker.is_some())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::start()
    }
}

impl Pipeline {
    /// Spawns the worker; when that fails every command runs synchronously.
    pub fn start() -> Self {
        Self {
            worker: Worker::spawn().ok(),
            next_seq: 0,
        }
    }

    pub fn synchronous() -> Self {
        Self {
            worker: None,
            next_seq: 0,
        }
    }

    pub fn is_background(&self) -> bool {
        self.worker.is_some()
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn dispatch(&mut self, command: PipelineCommand) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;

        let Some(worker) = self.worker.as_ref() else {
            return Ticket::ready(seq, command);
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let job = Job {
            seq,
            command: command.clone(),
            reply: reply_tx,
        };
        match worker.tx.send(job) {
            Ok(()) => Ticket {
                seq,
                state: TicketState::Pending {
                    rx: reply_rx,
                    fallback: command,
                },
            },
            Err(mpsc::SendError(job)) => {
                // Worker thread is gone (it panicked); stop using it.
                self.worker = None;
                Ticket::ready(seq, job.command)
            }
        }
    }

    /// Stops the worker after its current job. Further commands run synchronously.
    pub fn cleanup(&mut self) {
        if let Some(worker) = self.worker.take() {
            drop(worker.tx);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cleanup();
    }
}
