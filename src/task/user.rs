//! Launching the first user-mode program.

use crate::config::{pages_for, PAGE_SIZE, USER_ENTRY_VA, USER_MAX_ADDR, USER_STACK_SIZE, USER_TASK_ARG};
use crate::memory::{MemoryError, VmProt};

use super::{TaskError, TaskHandle, TaskSubsystem};

/// Page allocation and copying in the user part of the address space.
pub trait UserMemory {
    fn alloc_pages(&mut self, va: u64, pages: usize, prot: VmProt) -> Result<(), MemoryError>;
    fn copy_to(&mut self, va: u64, bytes: &[u8]) -> Result<(), MemoryError>;
}

/// A position-independent code blob and the offset of its first instruction.
#[derive(Debug, Clone, Copy)]
pub struct UserProgram {
    pub image: &'static [u8],
    pub entry_offset: u64,
}

impl From<MemoryError> for TaskError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::OutOfFrames => TaskError::OutOfMemory,
            _ => TaskError::Mapping,
        }
    }
}

/// Maps `program` at [`USER_ENTRY_VA`], gives it a stack ending at [`USER_MAX_ADDR`] and
/// creates the task.
pub fn start_user_task<M, T>(
    memory: &mut M,
    tasks: &T,
    program: &UserProgram,
) -> Result<TaskHandle, TaskError>
where
    M: UserMemory + ?Sized,
    T: TaskSubsystem + ?Sized,
{
    if program.image.len() as u64 > PAGE_SIZE || program.entry_offset >= program.image.len() as u64 {
        return Err(TaskError::Mapping);
    }

    memory.alloc_pages(USER_ENTRY_VA, 1, VmProt::RW | VmProt::EXEC | VmProt::USER)?;
    memory.copy_to(USER_ENTRY_VA, program.image)?;

    let stack_base = USER_MAX_ADDR - USER_STACK_SIZE;
    memory.alloc_pages(stack_base, pages_for(USER_STACK_SIZE), VmProt::RW | VmProt::USER)?;

    let handle = tasks.create(USER_ENTRY_VA + program.entry_offset, USER_MAX_ADDR, USER_TASK_ARG)?;
    log::info!(
        "task: user task {} at {:#x}, stack top {:#x}",
        handle.0,
        USER_ENTRY_VA + program.entry_offset,
        USER_MAX_ADDR
    );
    Ok(handle)
}
