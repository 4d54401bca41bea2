//! 成员负载监视
//!
//! 动态分派时为每个成员维护在途作业队列和已完成作业历史，按固定的全序为
//! 下一个作业挑选最合适的成员。令牌池的容量等于成员数，每次挑选消耗一个
//! 令牌，每次完成归还一个令牌，因此同时在途的动态作业不会超过成员数。

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, trace};

use groupcall_core::{GroupError, GroupResult};

/// 单个作业的计时记录
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub slot: usize,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub latency: Option<Duration>,
}

impl JobRecord {
    fn start(slot: usize) -> Self {
        Self {
            slot,
            started_at: Utc::now(),
            started: Instant::now(),
            latency: None,
        }
    }
}

/// 单个成员的负载状态
#[derive(Debug)]
pub struct WorkerState {
    pub index: usize,
    pub capacity: usize,
    /// 失败占位成员不参与挑选
    pub unavailable: bool,
    in_flight: VecDeque<JobRecord>,
    completed: VecDeque<JobRecord>,
}

impl WorkerState {
    fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            capacity,
            unavailable: false,
            in_flight: VecDeque::new(),
            completed: VecDeque::new(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn completed(&self) -> usize {
        self.completed.len()
    }

    fn below_capacity(&self) -> bool {
        self.in_flight.len() < self.capacity
    }

    /// 历史作业的平均耗时，没有历史时为零
    pub fn mean_latency(&self) -> Duration {
        if self.completed.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.completed.iter().filter_map(|job| job.latency).sum();
        total / self.completed.len() as u32
    }

    fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            index: self.index,
            in_flight: self.in_flight.len(),
            completed: self.completed.len(),
            mean_latency_ms: self.mean_latency().as_secs_f64() * 1000.0,
        }
    }
}

/// 负载状态快照，用于报告和日志
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub index: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub mean_latency_ms: f64,
}

/// 成员排序：排在前面的成员优先获得下一个作业
///
/// 1. 空闲成员优先
/// 2. 未满容量的成员优先于已满的成员
/// 3. 都未满时在途作业少者优先，其次平均耗时短者优先
/// 4. 都已满时完成作业多者优先，其次平均耗时短者优先
/// 5. 仍相同则下标小者优先
pub fn compare_workers(a: &WorkerState, b: &WorkerState) -> Ordering {
    let a_idle = a.in_flight.is_empty();
    let b_idle = b.in_flight.is_empty();

    let primary = match (a_idle, b_idle) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => match (a.below_capacity(), b.below_capacity()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a
                .in_flight
                .len()
                .cmp(&b.in_flight.len())
                .then_with(|| a.mean_latency().cmp(&b.mean_latency())),
            (false, false) => b
                .completed
                .len()
                .cmp(&a.completed.len())
                .then_with(|| a.mean_latency().cmp(&b.mean_latency())),
        },
    };

    primary.then_with(|| a.index.cmp(&b.index))
}

#[derive(Debug)]
pub struct WorkerLoadMonitor {
    state: Mutex<Vec<WorkerState>>,
    tokens: Semaphore,
    member_count: usize,
}

impl WorkerLoadMonitor {
    /// 每个成员的容量默认为 1
    pub fn new(member_count: usize) -> Self {
        Self::with_capacity(member_count, 1)
    }

    pub fn with_capacity(member_count: usize, capacity: usize) -> Self {
        let workers = (0..member_count)
            .map(|index| WorkerState::new(index, capacity))
            .collect();
        Self {
            state: Mutex::new(workers),
            tokens: Semaphore::new(member_count),
            member_count,
        }
    }

    /// 将给定成员标记为不可用，只有全部成员都不可用时才会挑中它们
    pub fn with_unavailable<I>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let workers = self.state.get_mut();
        for index in indices {
            if let Some(worker) = workers.get_mut(index) {
                worker.unavailable = true;
            }
        }
        self
    }

    pub fn member_count(&self) -> usize {
        self.member_count
    }

    pub fn available_tokens(&self) -> usize {
        self.tokens.available_permits()
    }

    /// 记录作业在成员上开始
    pub async fn on_dispatch(&self, worker: usize, slot: usize) -> GroupResult<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .get_mut(worker)
            .ok_or_else(|| GroupError::allocation(format!("成员下标越界: {worker}")))?;
        entry.in_flight.push_back(JobRecord::start(slot));
        trace!("成员 {} 开始作业 {}, 在途 {}", worker, slot, entry.in_flight.len());
        Ok(())
    }

    /// 记录成员上最早的在途作业完成，并归还一个令牌
    pub async fn on_completed(&self, worker: usize) -> GroupResult<()> {
        {
            let mut state = self.state.lock().await;
            let entry = state
                .get_mut(worker)
                .ok_or_else(|| GroupError::allocation(format!("成员下标越界: {worker}")))?;
            let mut job = entry.in_flight.pop_front().ok_or_else(|| {
                GroupError::allocation(format!("成员 {worker} 没有在途作业却收到完成通知"))
            })?;
            job.latency = Some(job.started.elapsed());
            trace!("成员 {} 完成作业 {}, 耗时 {:?}", worker, job.slot, job.latency);
            entry.completed.push_back(job);
        }
        self.tokens.add_permits(1);
        Ok(())
    }

    /// 等待一个令牌后返回排序最优的成员
    pub async fn pick_best_worker(&self) -> GroupResult<usize> {
        self.acquire_token().await?;
        let state = self.state.lock().await;
        best_of(&state)
    }

    /// 挑选成员并在同一临界区内登记作业开始
    pub async fn reserve_worker(&self, slot: usize) -> GroupResult<usize> {
        self.acquire_token().await?;
        let mut state = self.state.lock().await;
        let worker = best_of(&state)?;
        state[worker].in_flight.push_back(JobRecord::start(slot));
        debug!("动态分派: 作业 {} 分配给成员 {}", slot, worker);
        Ok(worker)
    }

    pub async fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.state
            .lock()
            .await
            .iter()
            .map(WorkerState::snapshot)
            .collect()
    }

    async fn acquire_token(&self) -> GroupResult<()> {
        if self.member_count == 0 {
            return Err(GroupError::allocation("没有可用成员"));
        }
        let permit = self
            .tokens
            .acquire()
            .await
            .map_err(|e| GroupError::allocation(format!("令牌池已关闭: {e}")))?;
        permit.forget();
        Ok(())
    }
}

fn best_of(state: &[WorkerState]) -> GroupResult<usize> {
    let any_live = state.iter().any(|worker| !worker.unavailable);
    state
        .iter()
        .filter(|worker| !any_live || !worker.unavailable)
        .min_by(|a, b| compare_workers(a, b))
        .map(|worker| worker.index)
        .ok_or_else(|| GroupError::allocation("没有可用成员"))
}
