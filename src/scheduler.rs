use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::errors::{EvalError, Result};
use crate::value::Value;

/// Number of worker threads available for blocking work.
pub const DEFAULT_WORKERS: usize = 8;

pub type TaskResult = core::result::Result<Value, EvalError>;

struct TaskState {
    name: String,
    cell: Mutex<Option<TaskResult>>,
    ready: Condvar,
}

/// Handle to an enrolled task.
///
/// A promise that is completed exactly once and may be joined any number of
/// times; each join yields a clone of the stored result.
#[derive(Clone)]
pub struct TaskHandle(Arc<TaskState>);

impl TaskHandle {
    fn new(name: String) -> Self {
        TaskHandle(Arc::new(TaskState {
            name,
            cell: Mutex::new(None),
            ready: Condvar::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_finished(&self) -> bool {
        self.0.cell.lock().is_some()
    }

    /// Block until the task completes and yield its result.
    pub fn join(&self) -> Result<Value> {
        let mut cell = self.0.cell.lock();
        while cell.is_none() {
            self.0.ready.wait(&mut cell);
        }
        match cell.as_ref() {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => unreachable!("condvar woke without a result"),
        }
    }

    pub(crate) fn complete(&self, result: TaskResult) {
        debug!(task = %self.0.name, ok = result.is_ok(), "task complete");
        let mut cell = self.0.cell.lock();
        *cell = Some(result);
        self.0.ready.notify_all();
    }
}

impl core::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.0.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed pool of OS threads that runs blocking callables on behalf of
/// cooperative tasks.
struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(width: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let workers = (0..width)
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("trellis-worker-{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    fn submit(&self, job: Job) {
        if let Some(sender) = &self.sender {
            // Send only fails when the receivers are gone, i.e. at teardown.
            let _ = sender.send(job);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Cooperative scheduler: the registry of named tasks plus the worker pool.
///
/// Tasks run on their own threads and complete a [`TaskHandle`] promise;
/// awaiting is a caller-side join, so join order is the caller's order
/// regardless of completion order.
pub struct Scheduler {
    tasks: Mutex<BTreeMap<String, TaskHandle>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
    pool: WorkerPool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }

    pub fn with_workers(width: usize) -> Self {
        Scheduler {
            tasks: Mutex::new(BTreeMap::new()),
            threads: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            pool: WorkerPool::new(width),
        }
    }

    /// Name assigned to tasks whose node carries no explicit name.
    pub fn synthesize_name(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("task_{id}")
    }

    /// Enroll a suspended computation under `name` and start running it.
    /// A task enrolled under an existing name replaces the previous entry.
    pub fn enroll<F>(&self, name: String, run: F) -> TaskHandle
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let handle = TaskHandle::new(name.clone());
        debug!(task = %name, "task enrolled");
        self.tasks.lock().insert(name.clone(), handle.clone());

        let thread_handle = handle.clone();
        let thread = std::thread::Builder::new()
            .name(format!("trellis-task-{name}"))
            .spawn(move || thread_handle.complete(run()))
            .expect("failed to spawn task thread");
        self.threads.lock().push(thread);
        handle
    }

    pub fn lookup(&self, name: &str) -> Option<TaskHandle> {
        self.tasks.lock().get(name).cloned()
    }

    /// Offload a blocking computation to the worker pool.
    pub fn offload<F>(&self, run: F) -> TaskHandle
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TaskHandle::new(format!("fiber_{id}"));
        debug!(fiber = %handle.name(), "fiber offloaded");
        let pool_handle = handle.clone();
        self.pool.submit(Box::new(move || pool_handle.complete(run())));
        handle
    }

    /// Join every spawned task thread, including tasks enrolled while
    /// draining. Completed handles stay in the registry so their results
    /// remain awaitable.
    pub fn drain(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut threads = self.threads.lock();
                threads.drain(..).collect()
            };
            if pending.is_empty() {
                break;
            }
            for thread in pending {
                let _ = thread.join();
            }
        }
    }
}
