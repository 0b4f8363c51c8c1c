// tasks.rs -- fixed-capacity multi-producer/multi-consumer parallel task
// scheduler. Structural port of original_source/Quake/tasks.c: same task
// table size, same dependency/epoch scheme, same indexed-task stripe
// stealing. The C file's SDL_mutex/SDL_cond map onto `parking_lot::{Mutex,
// Condvar}`; the hand-rolled CAS ring buffer the C uses for
// `free_queue`/`exec_queue` maps onto `crossbeam::channel::bounded`, which
// gives the same bounded-MPMC contract without a hand-written lock-free
// ring, and whose blocking `recv_timeout` also stands in for the original's
// semaphore wait on the exec queue. The original's nibble-swap slot shuffle
// (anti-false-sharing) is replaced by `crossbeam::utils::CachePadded` on
// each table entry, the idiomatic equivalent.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use vqcore_net::platform::{detected_cpu_count, spawn_worker};

pub const MAX_PENDING_TASKS: usize = 256;
pub const MAX_EXECUTABLE_TASKS: usize = 256;
pub const MAX_DEPENDENT_TASKS: usize = 16;
pub const MAX_PAYLOAD_SIZE: usize = 128;
pub const WAIT_SPIN_COUNT: u32 = 100;

const INVALID_TASK_HANDLE: u64 = u64::MAX;
const INDEX_BITS: u32 = 8;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Packed handle: low 8 bits are the table index, the rest is the epoch the
/// slot was allocated at. A handle whose epoch no longer matches the slot's
/// current epoch refers to a task that has already completed and been
/// recycled.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn invalid() -> Self {
        TaskHandle(INVALID_TASK_HANDLE)
    }

    pub fn is_valid(&self) -> bool {
        self.0 != INVALID_TASK_HANDLE
    }

    pub fn index(&self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    pub fn epoch(&self) -> u64 {
        self.0 >> INDEX_BITS
    }

    fn pack(index: usize, epoch: u64) -> Self {
        TaskHandle(((epoch << INDEX_BITS) | (index as u64 & INDEX_MASK)) as u64)
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        TaskHandle::invalid()
    }
}

type ScalarFn = Box<dyn FnOnce() + Send>;
type IndexedFn = Arc<dyn Fn(u32) + Send + Sync>;

/// A single worker's slice of an indexed task's `[0, limit)` range. Workers
/// run their own stripe first, then steal from neighboring stripes once
/// theirs drains.
struct Stripe {
    next: AtomicU32,
    limit: u32,
}

enum TaskBody {
    None,
    Scalar(ScalarFn),
    Indexed { func: IndexedFn, stripes: Vec<Stripe> },
}

struct SlotState {
    body: TaskBody,
    epoch: u64,
    dependents: Vec<usize>,
}

struct TaskSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
    remaining_dependencies: AtomicU32,
    remaining_workers: AtomicU32,
}

impl TaskSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState { body: TaskBody::None, epoch: 0, dependents: Vec::new() }),
            cond: Condvar::new(),
            remaining_dependencies: AtomicU32::new(0),
            remaining_workers: AtomicU32::new(0),
        }
    }
}

thread_local! {
    static WORKER_ID: std::cell::Cell<Option<usize>> = std::cell::Cell::new(None);
}

/// The scheduler: a fixed task table plus two bounded queues (free indices,
/// runnable indices) and a pool of worker threads.
pub struct TaskSys {
    table: Vec<CachePadded<TaskSlot>>,
    free_tx: Sender<usize>,
    free_rx: Receiver<usize>,
    exec_tx: Sender<usize>,
    exec_rx: Receiver<usize>,
    num_workers: usize,
    shutdown: AtomicBool,
    workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl TaskSys {
    /// Start the scheduler. `core_ids`, if given, fixes both the worker
    /// count and each worker's pinned CPU; otherwise the worker count is
    /// the detected CPU count clamped to `[1, 32]`.
    pub fn new(core_ids: Option<Vec<usize>>) -> Arc<Self> {
        let num_workers = core_ids.as_ref().map(|v| v.len()).unwrap_or_else(detected_cpu_count).max(1);

        let table = (0..MAX_PENDING_TASKS).map(|_| CachePadded::new(TaskSlot::new())).collect();
        let (free_tx, free_rx) = bounded(MAX_PENDING_TASKS);
        let (exec_tx, exec_rx) = bounded(MAX_EXECUTABLE_TASKS);
        for i in 0..MAX_PENDING_TASKS {
            free_tx.send(i).expect("free queue sized to MAX_PENDING_TASKS");
        }

        let sys = Arc::new(TaskSys {
            table,
            free_tx,
            free_rx,
            exec_tx,
            exec_rx,
            num_workers,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
        });

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let pin = core_ids.as_ref().map(|v| v[worker_id]);
            let sys = Arc::clone(&sys);
            handles.push(spawn_worker(format!("task-worker-{worker_id}"), pin, move || {
                WORKER_ID.with(|c| c.set(Some(worker_id)));
                sys.worker_loop(worker_id);
            }));
        }
        *sys.workers.lock() = handles;
        sys
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn is_worker() -> bool {
        WORKER_ID.with(|c| c.get().is_some())
    }

    pub fn worker_index() -> Option<usize> {
        WORKER_ID.with(|c| c.get())
    }

    /// Pop a free slot and initialize it with the implicit "not yet
    /// submitted" dependency.
    pub fn allocate(&self) -> TaskHandle {
        let index = self.free_rx.recv().expect("free queue outlives the scheduler");
        let slot = &self.table[index];
        slot.remaining_dependencies.store(1, Ordering::SeqCst);
        let epoch = {
            let mut state = slot.state.lock();
            state.body = TaskBody::None;
            state.dependents.clear();
            state.epoch
        };
        TaskHandle::pack(index, epoch)
    }

    pub fn assign_func<F>(&self, handle: TaskHandle, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = &self.table[handle.index()];
        let mut state = slot.state.lock();
        debug_assert_eq!(state.epoch, handle.epoch(), "assigning a stale task handle");
        state.body = TaskBody::Scalar(Box::new(f));
    }

    pub fn assign_indexed_func<F>(&self, handle: TaskHandle, limit: u32, f: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let stripe_len = if self.num_workers == 0 { limit } else { limit.div_ceil(self.num_workers as u32) };
        let stripes = (0..self.num_workers)
            .map(|w| {
                let start = w as u32 * stripe_len;
                let end = (start + stripe_len).min(limit);
                Stripe { next: AtomicU32::new(start), limit: end }
            })
            .collect();

        let slot = &self.table[handle.index()];
        let mut state = slot.state.lock();
        debug_assert_eq!(state.epoch, handle.epoch(), "assigning a stale task handle");
        state.body = TaskBody::Indexed { func: Arc::new(f), stripes };
    }

    /// Append `after` as a dependent of `before`. A no-op if `before` has
    /// already completed (its epoch moved on).
    pub fn add_dependency(&self, before: TaskHandle, after: TaskHandle) {
        let slot = &self.table[before.index()];
        let mut state = slot.state.lock();
        if state.epoch != before.epoch() {
            return;
        }
        debug_assert!(state.dependents.len() < MAX_DEPENDENT_TASKS, "too many dependents on one task");
        if state.dependents.len() >= MAX_DEPENDENT_TASKS {
            return;
        }
        state.dependents.push(after.index());
        self.table[after.index()].remaining_dependencies.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the implicit dependency added at `allocate`; once a task's
    /// dependency count reaches zero it becomes runnable.
    pub fn submit(&self, handle: TaskHandle) {
        let slot = &self.table[handle.index()];
        if slot.remaining_dependencies.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.make_runnable(handle.index());
        }
    }

    /// Called once a task's `remaining_dependencies` has just reached zero:
    /// figure out how many workers it needs and push it onto the exec
    /// queue that many times (or finish it inline if it has no work).
    fn make_runnable(&self, index: usize) {
        let slot = &self.table[index];
        let workers_needed = {
            let state = slot.state.lock();
            match &state.body {
                TaskBody::Indexed { stripes, .. } => {
                    let limit = stripes.last().map(|s| s.limit).unwrap_or(0);
                    if limit == 0 {
                        0
                    } else {
                        (limit as usize).min(self.num_workers).max(1)
                    }
                }
                _ => 1,
            }
        };

        if workers_needed == 0 {
            // Zero-length indexed task: nothing to run, finish synchronously.
            self.complete(index);
            return;
        }

        slot.remaining_workers.store(workers_needed as u32, Ordering::SeqCst);
        for _ in 0..workers_needed {
            self.push_exec(index);
        }
    }

    pub fn submit_all(&self, handles: &[TaskHandle]) {
        for &h in handles {
            self.submit(h);
        }
    }

    /// Block until `handle`'s task completes or `timeout` elapses. Returns
    /// `true` on completion, `false` on timeout. A handle whose epoch is
    /// already stale returns `true` immediately.
    pub fn join(&self, handle: TaskHandle, timeout: Duration) -> bool {
        let slot = &self.table[handle.index()];
        let mut state = slot.state.lock();
        if state.epoch != handle.epoch() {
            return true;
        }
        let deadline_result = slot.cond.wait_while_for(&mut state, |s| s.epoch == handle.epoch(), timeout);
        !deadline_result.timed_out()
    }

    fn push_exec(&self, index: usize) {
        self.exec_tx.send(index).expect("exec queue outlives the scheduler");
    }

    fn worker_loop(&self, worker_id: usize) {
        let mut spins = 0u32;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            match self.exec_rx.try_recv() {
                Ok(index) => {
                    spins = 0;
                    self.run_one(worker_id, index);
                }
                Err(_) => {
                    if spins < WAIT_SPIN_COUNT {
                        spins += 1;
                        std::hint::spin_loop();
                        continue;
                    }
                    // Block until the next push, bounded so shutdown is
                    // still observed promptly.
                    match self.exec_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(index) => {
                            spins = 0;
                            self.run_one(worker_id, index);
                        }
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    fn run_one(&self, worker_id: usize, index: usize) {
        let slot = &self.table[index];
        let dispatch = {
            let state = slot.state.lock();
            match &state.body {
                TaskBody::Scalar(_) => Dispatch::Scalar,
                TaskBody::Indexed { .. } => Dispatch::Indexed,
                TaskBody::None => Dispatch::None,
            }
        };

        match dispatch {
            Dispatch::Scalar => {
                let f = {
                    let mut state = slot.state.lock();
                    match std::mem::replace(&mut state.body, TaskBody::None) {
                        TaskBody::Scalar(f) => f,
                        other => {
                            state.body = other;
                            return;
                        }
                    }
                };
                f();
            }
            Dispatch::Indexed => {
                self.run_indexed_stripe(worker_id, index);
            }
            Dispatch::None => return,
        }

        if slot.remaining_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.complete(index);
        }
    }

    fn run_indexed_stripe(&self, worker_id: usize, index: usize) {
        let slot = &self.table[index];
        let (func, num_stripes) = {
            let state = slot.state.lock();
            match &state.body {
                TaskBody::Indexed { func, stripes } => (Arc::clone(func), stripes.len()),
                _ => return,
            }
        };
        if num_stripes == 0 {
            return;
        }

        for offset in 0..num_stripes {
            let stripe_idx = (worker_id + offset) % num_stripes;
            loop {
                let i = {
                    let state = slot.state.lock();
                    let stripes = match &state.body {
                        TaskBody::Indexed { stripes, .. } => stripes,
                        _ => return,
                    };
                    let stripe = &stripes[stripe_idx];
                    let i = stripe.next.fetch_add(1, Ordering::SeqCst);
                    if i >= stripe.limit {
                        None
                    } else {
                        Some(i)
                    }
                };
                match i {
                    Some(i) => func(i),
                    None => break,
                }
            }
        }
    }

    /// Run by whichever worker was last to finish its share of the task:
    /// submit every dependent, bump the epoch so stale handles are detected,
    /// wake any joiners, and recycle the slot.
    fn complete(&self, index: usize) {
        let slot = &self.table[index];
        let dependents = {
            let mut state = slot.state.lock();
            state.body = TaskBody::None;
            state.epoch = state.epoch.wrapping_add(1);
            self.cond_notify(slot);
            std::mem::take(&mut state.dependents)
        };

        for dep_index in dependents {
            let dep_slot = &self.table[dep_index];
            if dep_slot.remaining_dependencies.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.make_runnable(dep_index);
            }
        }

        self.free_tx.send(index).expect("free queue sized to MAX_PENDING_TASKS");
    }

    fn cond_notify(&self, slot: &TaskSlot) {
        slot.cond.notify_all();
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for TaskSys {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Dispatch {
    None,
    Scalar,
    Indexed,
}

pub fn allocate_assign_and_submit<F>(sys: &TaskSys, f: F) -> TaskHandle
where
    F: FnOnce() + Send + 'static,
{
    let h = sys.allocate();
    sys.assign_func(h, f);
    sys.submit(h);
    h
}

pub fn allocate_assign_indexed_and_submit<F>(sys: &TaskSys, limit: u32, f: F) -> TaskHandle
where
    F: Fn(u32) + Send + Sync + 'static,
{
    let h = sys.allocate();
    sys.assign_indexed_func(h, limit, f);
    sys.submit(h);
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn scalar_task_runs_and_completes() {
        let sys = TaskSys::new(None);
        let done = Arc::new(AtomicBool::new(false));
        let done2 = Arc::clone(&done);
        let h = allocate_assign_and_submit(&sys, move || {
            done2.store(true, Ordering::SeqCst);
        });
        assert!(sys.join(h, Duration::from_secs(2)));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn indexed_task_covers_every_index_exactly_once() {
        let sys = TaskSys::new(None);
        let hits = Arc::new((0..64).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let hits2 = Arc::clone(&hits);
        let h = allocate_assign_indexed_and_submit(&sys, 64, move |i| {
            hits2[i as usize].fetch_add(1, Ordering::SeqCst);
        });
        assert!(sys.join(h, Duration::from_secs(2)));
        for counter in hits.iter() {
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn zero_length_indexed_task_completes_immediately() {
        let sys = TaskSys::new(None);
        let h = allocate_assign_indexed_and_submit(&sys, 0, |_| {
            panic!("should never run");
        });
        assert!(sys.join(h, Duration::from_secs(1)));
    }

    #[test]
    fn dependent_runs_after_dependency_completes() {
        let sys = TaskSys::new(None);
        let order = Arc::new(Mutex::new(Vec::new()));

        let before = sys.allocate();
        let after = sys.allocate();

        let order1 = Arc::clone(&order);
        sys.assign_func(before, move || order1.lock().push(1));
        let order2 = Arc::clone(&order);
        sys.assign_func(after, move || order2.lock().push(2));

        sys.add_dependency(before, after);
        sys.submit(after);
        sys.submit(before);

        assert!(sys.join(after, Duration::from_secs(2)));
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn join_on_stale_handle_returns_immediately() {
        let sys = TaskSys::new(None);
        let h = allocate_assign_and_submit(&sys, || {});
        assert!(sys.join(h, Duration::from_secs(2)));
        // h's epoch has since moved on; joining again must not block.
        assert!(sys.join(h, Duration::from_millis(10)));
    }

    #[test]
    fn join_times_out_on_a_task_that_never_runs() {
        let sys = TaskSys::new(None);
        let h = sys.allocate();
        sys.assign_func(h, || std::thread::sleep(Duration::from_secs(5)));
        sys.submit(h);
        assert!(!sys.join(h, Duration::from_millis(10)));
    }
}
