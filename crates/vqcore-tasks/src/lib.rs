#![allow(dead_code, unused_variables, unused_assignments, unused_mut)]
#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::type_complexity)]

// Parallel task scheduler — converted from original_source/Quake/tasks.c.
// Has no dependency on the networking crates; it only reaches into
// vqcore-net for the small OS shim (Semaphore, thread spawn, core pinning)
// that tasks.c borrowed from SDL.

pub mod tasks;

pub use tasks::{TaskHandle, TaskSys};
