use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use debtleads_core::{Amount, MatchStrategy};
use debtleads_pipeline::MatchOutcome;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Done,
    Failed,
}

/// What a finished job returns.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub minimum_threshold: Amount,
    pub debtor_count: usize,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

impl JobReport {
    pub fn strategy(&self) -> MatchStrategy {
        self.outcome.strategy()
    }
}

/// A job's full state. Status and result live in one value, so a reader
/// never sees one without the other.
#[derive(Debug, Clone)]
pub enum JobState {
    Pending,
    Done(Arc<JobReport>),
    Failed(String),
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Done(_) => JobStatus::Done,
            Self::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Job table. Each job has a single writer (the task running it).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a new pending job.
    async fn create(&self) -> Uuid;
    /// Replace a job's state once it has finished.
    async fn finish(&self, id: Uuid, state: JobState);
    async fn get(&self, id: Uuid) -> Option<JobState>;
}

const DEFAULT_MAX_FINISHED: usize = 1000;

#[derive(Debug, Default)]
struct Jobs {
    states: HashMap<Uuid, JobState>,
    /// Finished job ids, oldest first.
    finished: VecDeque<Uuid>,
}

/// Process-local job table. Pending jobs are always kept; once more than
/// `max_finished` jobs have finished, the oldest finished ones are dropped.
#[derive(Debug)]
pub struct MemoryJobStore {
    jobs: RwLock<Jobs>,
    max_finished: usize,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_FINISHED)
    }

    pub fn with_capacity(max_finished: usize) -> Self {
        Self {
            jobs: RwLock::new(Jobs::default()),
            max_finished: max_finished.max(1),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.write().await.states.insert(id, JobState::Pending);
        id
    }

    async fn finish(&self, id: Uuid, state: JobState) {
        let mut jobs = self.jobs.write().await;
        let was_finished = jobs
            .states
            .insert(id, state)
            .is_some_and(|old| !matches!(old, JobState::Pending));
        if !was_finished {
            jobs.finished.push_back(id);
        }
        while jobs.finished.len() > self.max_finished {
            if let Some(oldest) = jobs.finished.pop_front() {
                jobs.states.remove(&oldest);
                debug!(job = %oldest, "evicted finished job");
            }
        }
    }

    async fn get(&self, id: Uuid) -> Option<JobState> {
        self.jobs.read().await.states.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_moves_from_pending_to_failed() {
        let store = MemoryJobStore::new();
        let id = store.create().await;
        assert_eq!(store.get(id).await.unwrap().status(), JobStatus::Pending);

        store.finish(id, JobState::Failed("boom".into())).await;
        let state = store.get(id).await.unwrap();
        assert_eq!(state.status(), JobStatus::Failed);
        assert!(matches!(state, JobState::Failed(msg) if msg == "boom"));
    }

    #[tokio::test]
    async fn oldest_finished_jobs_are_evicted() {
        let store = MemoryJobStore::with_capacity(2);
        let pending = store.create().await;
        let mut done = Vec::new();
        for _ in 0..3 {
            let id = store.create().await;
            store.finish(id, JobState::Failed("x".into())).await;
            done.push(id);
        }

        assert!(store.get(done[0]).await.is_none());
        assert!(store.get(done[1]).await.is_some());
        assert!(store.get(done[2]).await.is_some());
        assert_eq!(store.get(pending).await.unwrap().status(), JobStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let store = MemoryJobStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn report_serializes_outcome_inline() {
        let report = JobReport {
            minimum_threshold: Amount::from_units(100_000),
            debtor_count: 0,
            outcome: MatchOutcome::RowLevel {
                matched: vec![],
                unmatched: vec![],
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "row-level");
        assert_eq!(json["minimum_threshold"], 100000.0);
        assert!(json["matched"].as_array().unwrap().is_empty());
    }
}
