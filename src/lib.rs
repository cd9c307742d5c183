//! # Halcyon kernel core
//!
//! Bootstrap and interrupt-driven input layer of a small monolithic x86_64 kernel.
//!
//! ## Layout
//!
//! - `devices`: the PS/2 keyboard driver (scan-code table, modifier tracker, IRQ pipeline)
//! - `interrupts`: IRQ line control and the interrupt vector table
//! - `memory`: frame allocator, collaborator traits, the ordered bootstrap sequence
//! - `task`: scheduler seam, wait queue, first user task
//! - `syscalls`: system call numbers and dispatcher
//! - `kernel`: the kernel context object and boot phase tracking
//! - `arch`: x86_64 platform layer (bare-metal builds only)
//!
//! Everything outside `arch` reaches hardware through traits, so the library also builds
//! for the host and its unit tests run there.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

extern crate alloc;

pub mod config;
pub mod devices;
pub mod interrupts;
pub mod kernel;
pub mod memory;
pub mod syscalls;
pub mod task;
pub mod time;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod arch;

pub use kernel::Kernel;
