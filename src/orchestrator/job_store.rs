//! 任务存储
//!
//! 任务状态的唯一来源。接口与实现分离，以后换成持久化后端时
//! 执行器和分析流程都不用改。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::BatchJob;

/// 任务存储接口
///
/// 所有读取都返回副本；修改只能通过 `update` 在锁内完成。
pub trait JobStore: Send + Sync {
    fn insert(&self, job: BatchJob);

    fn get(&self, job_id: &str) -> Option<BatchJob>;

    /// 在锁内修改任务，任务不存在时返回 false
    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut BatchJob)) -> bool;

    /// 某个用户的全部任务，按创建时间倒序
    fn list_by_owner(&self, owner_id: &str) -> Vec<BatchJob>;

    /// 删除 `completed_at` 早于 `cutoff` 的终止任务，返回被删除的 id
    fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct StoredJob {
    sequence: u64,
    job: BatchJob,
}

/// 内存任务存储
///
/// 按用户查询是全表扫描，任务量小的时候够用。
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, StoredJob>,
    sequence: AtomicU64,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: BatchJob) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.jobs.insert(job.id.clone(), StoredJob { sequence, job });
    }

    fn get(&self, job_id: &str) -> Option<BatchJob> {
        self.jobs.get(job_id).map(|stored| stored.job.clone())
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut BatchJob)) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(mut stored) => {
                apply(&mut stored.job);
                true
            }
            None => false,
        }
    }

    fn list_by_owner(&self, owner_id: &str) -> Vec<BatchJob> {
        let mut owned: Vec<(u64, BatchJob)> = self
            .jobs
            .iter()
            .filter(|entry| entry.job.owner_id == owner_id)
            .map(|entry| (entry.sequence, entry.job.clone()))
            .collect();
        owned.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        owned.into_iter().map(|(_, job)| job).collect()
    }

    fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut removed = Vec::new();
        self.jobs.retain(|job_id, stored| {
            let expired = stored.job.is_terminal()
                && stored
                    .job
                    .completed_at
                    .map(|completed| completed < cutoff)
                    .unwrap_or(false);
            if expired {
                removed.push(job_id.clone());
            }
            !expired
        });
        removed
    }

    fn len(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchAnalysisOptions, JobStatus};
    use chrono::Duration;

    fn job(id: &str, owner: &str) -> BatchJob {
        BatchJob::new(
            id,
            owner,
            vec!["d1".to_string()],
            BatchAnalysisOptions::default(),
        )
    }

    #[test]
    fn test_get_returns_copy() {
        let store = InMemoryJobStore::new();
        store.insert(job("j1", "u1"));

        let mut copy = store.get("j1").unwrap();
        copy.status = JobStatus::Completed;

        assert_eq!(store.get("j1").unwrap().status, JobStatus::Pending);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_update_applies_in_place() {
        let store = InMemoryJobStore::new();
        store.insert(job("j1", "u1"));

        assert!(store.update("j1", &mut |job: &mut BatchJob| {
            job.status = JobStatus::Processing
        }));
        assert!(!store.update("missing", &mut |_: &mut BatchJob| {}));
        assert_eq!(store.get("j1").unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_list_by_owner_newest_first() {
        let store = InMemoryJobStore::new();
        let created = Utc::now();
        for id in ["j1", "j2", "j3"] {
            let mut job = job(id, "u1");
            job.created_at = created;
            store.insert(job);
        }
        store.insert(job("other", "u2"));

        let ids: Vec<String> = store
            .list_by_owner("u1")
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec!["j3", "j2", "j1"]);
        assert!(store.list_by_owner("nobody").is_empty());
    }

    #[test]
    fn test_remove_expired_only_touches_old_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut old_done = job("old-done", "u1");
        old_done.finish(JobStatus::Completed, None);
        old_done.completed_at = Some(now - Duration::hours(25));
        store.insert(old_done);

        let mut fresh_done = job("fresh-done", "u1");
        fresh_done.finish(JobStatus::Partial, None);
        store.insert(fresh_done);

        let mut running = job("running", "u1");
        running.status = JobStatus::Processing;
        store.insert(running);

        let removed = store.remove_expired(now - Duration::hours(24));

        assert_eq!(removed, vec!["old-done".to_string()]);
        assert_eq!(store.len(), 2);
        assert!(store.get("fresh-done").is_some());
        assert!(store.get("running").is_some());
    }
}
