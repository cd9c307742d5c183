//! # Time System Call Handlers
//!
//! - `sys_ticks`: timer interrupts counted since they were enabled

use crate::syscalls::dispatcher::SyscallResult;
use crate::syscalls::SyscallHost;

pub fn sys_ticks<H: SyscallHost + ?Sized>(host: &H) -> SyscallResult {
    Ok(host.ticks() as usize)
}
