//! System calls
//!
//! User code enters through `int 0x80` with the call number in `rax`; the platform's entry
//! stub builds a [`SyscallContext`] and hands it to [`dispatch_syscall`] together with the
//! kernel, which provides the services below.

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

pub use dispatcher::{dispatch_syscall, encode_result, SyscallContext, SyscallError, SyscallResult};
pub use numbers::SyscallNumber;

/// Kernel services reachable from system calls.
pub trait SyscallHost {
    /// Blocks until a key code is available.
    fn get_char(&self) -> u16;
    fn ticks(&self) -> u64;
}
