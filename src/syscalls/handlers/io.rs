//! # I/O System Call Handlers
//!
//! - `sys_getchar`: block until the keyboard produces a code, return it in the low 16 bits

use crate::syscalls::dispatcher::SyscallResult;
use crate::syscalls::SyscallHost;

pub fn sys_getchar<H: SyscallHost + ?Sized>(host: &H) -> SyscallResult {
    let code = host.get_char();
    log::debug!("getchar: {:#06x}", code);
    Ok(usize::from(code))
}
