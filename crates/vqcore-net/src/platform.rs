// platform.rs -- the thin OS layer the rest of the stack is built on:
// thread spawn with a name, a counting semaphore (no crate in the dependency
// stack provides one), and best-effort worker core pinning. Converted from:
// myq2-original/win32/sys_win.rs, generalized off Windows-only primitives.

use parking_lot::{Condvar, Mutex};
use std::thread::{self, JoinHandle};

pub use vqcore_common::common::sys_milliseconds;

/// A classic counting semaphore: `wait` blocks while the count is zero,
/// `post` increments and wakes one waiter. Built on `parking_lot::{Mutex,
/// Condvar}` since the dependency stack carries no semaphore crate of its
/// own.
pub struct Semaphore {
    count: Mutex<i64>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: i64) -> Self {
        Self { count: Mutex::new(initial), cond: Condvar::new() }
    }

    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }
}

/// Spawn a named worker thread, optionally pinned to a CPU core.
pub fn spawn_worker<F>(name: String, core_id: Option<usize>, f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            if let Some(core) = core_id {
                pin_to_core(core);
            }
            f();
        })
        .expect("failed to spawn worker thread")
}

/// Detected logical CPU count, clamped to `[1, 32]` per the scheduler's
/// worker-count rule.
pub fn detected_cpu_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).clamp(1, 32)
}

#[cfg(target_os = "linux")]
mod affinity {
    use std::mem;

    #[repr(C)]
    struct CpuSet {
        bits: [u64; 16], // 1024 CPUs, matches glibc's default cpu_set_t size
    }

    extern "C" {
        fn sched_setaffinity(pid: i32, cpusetsize: usize, mask: *const CpuSet) -> i32;
    }

    pub fn pin(core_id: usize) {
        let mut set: CpuSet = unsafe { mem::zeroed() };
        let word = core_id / 64;
        let bit = core_id % 64;
        if word >= set.bits.len() {
            return;
        }
        set.bits[word] |= 1u64 << bit;
        unsafe {
            sched_setaffinity(0, mem::size_of::<CpuSet>(), &set);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod affinity {
    pub fn pin(_core_id: usize) {
        // No portable affinity API outside Linux in this stack; the worker
        // still runs, just without a pinning guarantee.
    }
}

/// Best-effort pin of the calling thread to a CPU core. A no-op on targets
/// without a known affinity syscall.
pub fn pin_to_core(core_id: usize) {
    affinity::pin(core_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn semaphore_wait_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            sem2.wait();
        });
        thread::sleep(std::time::Duration::from_millis(20));
        sem.post();
        handle.join().unwrap();
    }

    #[test]
    fn semaphore_initial_count_allows_immediate_wait() {
        let sem = Semaphore::new(2);
        sem.wait();
        sem.wait();
    }

    #[test]
    fn detected_cpu_count_is_clamped() {
        let n = detected_cpu_count();
        assert!(n >= 1 && n <= 32);
    }
}
