use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;
use crate::syscalls::SyscallHost;

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::InvalidSyscall => -1,
        }
    }
}

/// System call context - the registers saved by the `int 0x80` entry stub
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallContext {
    pub syscall_num: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
}

impl SyscallContext {
    ///   rax = syscall number
    ///   rdi = arg0
    ///   rsi = arg1
    ///   rdx = arg2
    pub fn from_registers(rax: usize, rdi: usize, rsi: usize, rdx: usize) -> Self {
        Self {
            syscall_num: rax,
            arg0: rdi,
            arg1: rsi,
            arg2: rdx,
        }
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall<H: SyscallHost + ?Sized>(host: &H, ctx: SyscallContext) -> SyscallResult {
    let syscall = SyscallNumber::from(ctx.syscall_num);
    log::trace!("syscall {:?}({:#x}, {:#x}, {:#x})", syscall, ctx.arg0, ctx.arg1, ctx.arg2);

    match syscall {
        SyscallNumber::GetChar => handlers::io::sys_getchar(host),
        SyscallNumber::Ticks => handlers::time::sys_ticks(host),
        SyscallNumber::Unknown => Err(SyscallError::InvalidSyscall),
    }
}

/// Value placed in `rax` on return to the caller.
pub fn encode_result(result: SyscallResult) -> usize {
    match result {
        Ok(value) => value,
        Err(err) => err.as_errno() as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Host {
        next_char: u16,
        reads: Cell<u32>,
    }

    impl SyscallHost for Host {
        fn get_char(&self) -> u16 {
            self.reads.set(self.reads.get() + 1);
            self.next_char
        }

        fn ticks(&self) -> u64 {
            42
        }
    }

    fn host() -> Host {
        Host {
            next_char: 0x1E61,
            reads: Cell::new(0),
        }
    }

    #[test]
    fn test_getchar_returns_code() {
        let host = host();
        let ctx = SyscallContext::from_registers(0, 0x5a, 0, 0);
        assert_eq!(dispatch_syscall(&host, ctx), Ok(0x1E61));
        assert_eq!(host.reads.get(), 1);
    }

    #[test]
    fn test_release_code_passes_through() {
        let host = Host {
            next_char: 0x9E00,
            reads: Cell::new(0),
        };
        let ctx = SyscallContext::from_registers(0, 0, 0, 0);
        assert_eq!(encode_result(dispatch_syscall(&host, ctx)), 0x9E00);
    }

    #[test]
    fn test_ticks() {
        let ctx = SyscallContext::from_registers(1, 0, 0, 0);
        assert_eq!(dispatch_syscall(&host(), ctx), Ok(42));
    }

    #[test]
    fn test_unknown_number() {
        let host = host();
        let ctx = SyscallContext::from_registers(99, 0, 0, 0);
        let result = dispatch_syscall(&host, ctx);
        assert_eq!(result, Err(SyscallError::InvalidSyscall));
        assert_eq!(encode_result(result), usize::MAX);
        assert_eq!(host.reads.get(), 0);
    }
}
