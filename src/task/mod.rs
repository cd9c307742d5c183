//! Task Subsystem Seam
//!
//! The boot sequence only needs a handful of scheduler operations; they are collected in
//! [`TaskSubsystem`] so the boot path and its tests do not depend on the x86_64 scheduler.
//!
//! # Task Lifecycle
//! 1. `init()` sets up the run queue
//! 2. `run_as_task0()` turns the boot thread into the idle task
//! 3. `create(entry, stack_top, arg)` adds a user task in `Ready` state
//! 4. `yield_now()` hands the CPU to the next ready task

use core::fmt;

pub mod user;
pub mod wait_queue;

pub use user::{start_user_task, UserMemory, UserProgram};
pub use wait_queue::{Suspend, TicketQueue, WaitQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskError {
    NotInitialized,
    TooManyTasks,
    OutOfMemory,
    /// Mapping the task's image or stack failed.
    Mapping,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::NotInitialized => write!(f, "task subsystem not initialized"),
            TaskError::TooManyTasks => write!(f, "task table full"),
            TaskError::OutOfMemory => write!(f, "out of memory for task"),
            TaskError::Mapping => write!(f, "could not map task memory"),
        }
    }
}

pub trait TaskSubsystem {
    fn init(&self) -> Result<(), TaskError>;

    /// Turns the calling (boot) thread into task 0. Called once.
    fn run_as_task0(&self) -> Result<TaskHandle, TaskError>;

    /// Creates a user-mode task starting at `entry` with its stack pointer at `stack_top`
    /// and `arg` in the first argument register.
    fn create(&self, entry: u64, stack_top: u64, arg: u64) -> Result<TaskHandle, TaskError>;

    fn yield_now(&self);
}
