//! System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    /// Blocks for the next key code.
    GetChar = 0,
    /// Timer ticks since interrupts were enabled.
    Ticks = 1,

    Unknown = usize::MAX,
}

impl From<usize> for SyscallNumber {
    fn from(num: usize) -> Self {
        match num {
            0 => Self::GetChar,
            1 => Self::Ticks,
            _ => Self::Unknown,
        }
    }
}
