use crate::engine::state::{Reply, RunState, RunStatus};
use crate::models::ChatId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Mode-specific parts of a job.
#[derive(Debug)]
pub enum JobKind {
    Continuous {
        interval_ms: u64,
    },
    Script {
        /// Inbound replies for the run's driver.
        replies: mpsc::Sender<Reply>,
        /// Latest state published by the driver.
        state: watch::Receiver<RunState>,
    },
}

/// One active run. Dropping a job aborts its task.
#[derive(Debug)]
pub struct Job {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub kind: JobKind,
    task: JoinHandle<()>,
}

impl Job {
    pub fn new(run_id: Uuid, kind: JobKind, task: JoinHandle<()>) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            kind,
            task,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn status(&self) -> RunStatus {
        let state = match &self.kind {
            JobKind::Continuous { interval_ms } => RunState::Continuous {
                interval_ms: *interval_ms,
            },
            JobKind::Script { state, .. } => state.borrow().clone(),
        };
        RunStatus {
            run_id: self.run_id,
            started_at: self.started_at,
            state,
        }
    }

    /// Hands `text` to the driver if the run is waiting for a reply.
    ///
    /// The reply is tagged with the turn it was accepted in; the driver drops
    /// it if that turn has already been answered.
    pub fn offer_reply(&self, text: String) -> bool {
        let JobKind::Script { replies, state } = &self.kind else {
            return false;
        };
        let turn = match &*state.borrow() {
            RunState::Script(s) if s.awaiting.is_some() => s.turn,
            _ => return false,
        };
        replies.try_send(Reply { turn, text }).is_ok()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Conversation id -> active run.
///
/// Owned by the scheduler actor; every mutation happens on the actor's task,
/// so replace and remove are never interleaved with another command.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<ChatId, Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `job`, cancelling whatever ran for the conversation before.
    /// Returns the id of the replaced run.
    pub fn replace(&mut self, chat_id: ChatId, job: Job) -> Option<Uuid> {
        self.jobs.insert(chat_id, job).map(|old| old.run_id)
    }

    /// Cancels and removes the conversation's run. Idempotent.
    pub fn remove(&mut self, chat_id: ChatId) -> bool {
        self.jobs.remove(&chat_id).is_some()
    }

    /// Removes the run only if it is still `run_id`; a newer run is left alone.
    pub fn remove_finished(&mut self, chat_id: ChatId, run_id: Uuid) -> bool {
        match self.jobs.get(&chat_id) {
            Some(job) if job.run_id == run_id => self.remove(chat_id),
            _ => false,
        }
    }

    /// Looks up a live run, dropping the entry if its task already ended.
    pub fn get(&mut self, chat_id: ChatId) -> Option<&Job> {
        if self.jobs.get(&chat_id).is_some_and(Job::is_finished) {
            self.jobs.remove(&chat_id);
        }
        self.jobs.get(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Cancels every run.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    fn idle_job(interval_ms: u64) -> Job {
        Job::new(
            Uuid::new_v4(),
            JobKind::Continuous { interval_ms },
            tokio::spawn(pending::<()>()),
        )
    }

    #[tokio::test]
    async fn test_replace_keeps_one_job_per_conversation() {
        let mut table = JobTable::new();
        let first = idle_job(2_000);
        let first_id = first.run_id;

        assert_eq!(table.replace(1, first), None);
        assert_eq!(table.replace(1, idle_job(3_000)), Some(first_id));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(1).unwrap().status().state,
            RunState::Continuous { interval_ms: 3_000 }
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let mut table = JobTable::new();
        table.replace(7, idle_job(2_000));
        assert!(table.remove(7));
        assert!(!table.remove(7));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_remove_finished_ignores_superseding_run() {
        let mut table = JobTable::new();
        let old = idle_job(2_000);
        let old_id = old.run_id;
        table.replace(5, old);
        let newer = idle_job(4_000);
        let newer_id = newer.run_id;
        table.replace(5, newer);

        assert!(!table.remove_finished(5, old_id));
        assert_eq!(table.get(5).unwrap().run_id, newer_id);
        assert!(table.remove_finished(5, newer_id));
    }

    #[tokio::test]
    async fn test_dropping_job_aborts_its_task() {
        let handle = tokio::spawn(pending::<()>());
        let abort = handle.abort_handle();
        let mut table = JobTable::new();
        table.replace(9, Job::new(Uuid::new_v4(), JobKind::Continuous { interval_ms: 2_000 }, handle));
        table.remove(9);
        for _ in 0..50 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_get_prunes_finished_tasks() {
        let handle = tokio::spawn(async {});
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        let mut table = JobTable::new();
        table.replace(3, Job::new(Uuid::new_v4(), JobKind::Continuous { interval_ms: 2_000 }, handle));
        assert!(table.get(3).is_none());
        assert!(table.is_empty());
    }
}
