//! # System Call Handlers
//!
//! ## Modules
//!
//! - `io`: keyboard input
//! - `time`: timer ticks
//!
//! ## Handler Signature
//!
//! Each handler takes the kernel services it needs and returns a result:
//! ```ignore
//! fn sys_getchar(host: &impl SyscallHost) -> SyscallResult
//! ```

pub mod io;
pub mod time;
