//! 执行线程池
//!
//! 若干长期运行的 tokio 任务从同一个先进先出队列中取作业执行。池的大小只增
//! 不减，由每次分派按成员数计算出的目标大小驱动。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, trace, Instrument};

use groupcall_core::{GroupError, GroupResult};

pub type Job = BoxFuture<'static, ()>;

pub struct WorkerPool {
    name: String,
    sender: mpsc::UnboundedSender<Job>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: AtomicUsize,
}

impl WorkerPool {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            workers: Mutex::new(Vec::new()),
            size: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// 把池扩充到至少 `target` 个工作者，返回扩充后的大小
    pub async fn ensure_workers(&self, target: usize) -> usize {
        let mut workers = self.workers.lock().await;
        while workers.len() < target {
            let worker_name = format!("{}-worker-{}", self.name, workers.len());
            let receiver = Arc::clone(&self.receiver);
            debug!("启动执行线程: {}", worker_name);
            workers.push(tokio::spawn(worker_loop(worker_name, receiver)));
        }
        self.size.store(workers.len(), Ordering::Release);
        workers.len()
    }

    /// 提交作业到共享队列
    pub fn submit(&self, job: Job) -> GroupResult<()> {
        self.sender
            .send(job)
            .map_err(|_| GroupError::allocation(format!("线程池 {} 已关闭", self.name)))
    }
}

async fn worker_loop(worker_name: String, receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            trace!("执行线程 {} 退出", worker_name);
            break;
        };
        let outcome = AssertUnwindSafe(job)
            .catch_unwind()
            .instrument(info_span!("pool_job", worker = %worker_name))
            .await;
        if outcome.is_err() {
            error!("执行线程 {} 中的作业 panic", worker_name);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in self.workers.get_mut().iter() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}
