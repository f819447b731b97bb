use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifies the reminder job of one todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobKey(i64);

impl JobKey {
    pub fn for_todo(todo_id: i64) -> Self {
        Self(todo_id)
    }

    pub fn todo_id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reminder_{}", self.0)
    }
}

/// Identifies one scheduled instance of a job.
///
/// Rescheduling the same todo produces a new token, so a timer that was armed
/// for an older instance can tell it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobToken(u64);

impl JobToken {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub key: JobKey,
    pub trigger_at: DateTime<Utc>,
    pub token: JobToken,
}

impl ScheduledJob {
    pub fn new(key: JobKey, trigger_at: DateTime<Utc>) -> Self {
        Self {
            key,
            trigger_at,
            token: JobToken::next(),
        }
    }
}

/// Pending reminder jobs, at most one per key.
///
/// Every operation takes the lock for the duration of a single map access,
/// so callers racing on the same key are totally ordered.
#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobKey, ScheduledJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for `key`. Does not cancel anything.
    pub fn put(&self, key: JobKey, job: ScheduledJob) {
        self.jobs.lock().unwrap().insert(key, job);
    }

    pub fn remove(&self, key: &JobKey) -> Option<ScheduledJob> {
        self.jobs.lock().unwrap().remove(key)
    }

    pub fn get(&self, key: &JobKey) -> Option<ScheduledJob> {
        self.jobs.lock().unwrap().get(key).copied()
    }

    /// Removes the previous job for `key` and installs `job` in one critical section.
    pub fn replace(&self, key: JobKey, job: ScheduledJob) -> Option<ScheduledJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let previous = jobs.remove(&key);
        jobs.insert(key, job);
        previous
    }

    /// Removes the entry only if it still belongs to the instance `token`.
    pub fn remove_if_current(&self, key: &JobKey, token: JobToken) -> Option<ScheduledJob> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get(key) {
            Some(job) if job.token == token => jobs.remove(key),
            _ => None,
        }
    }

    pub fn is_current(&self, key: &JobKey, token: JobToken) -> bool {
        self.jobs
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|job| job.token == token)
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every pending job, earliest trigger first.
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self.jobs.lock().unwrap().values().copied().collect();
        jobs.sort_by_key(|job| (job.trigger_at, job.key));
        jobs
    }
}
