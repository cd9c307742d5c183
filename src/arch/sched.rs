//! Cooperative round-robin scheduler.
//!
//! Task 0 is the boot thread. Every other task gets its own kernel stack and starts by
//! dropping to ring 3 through `iretq`. Switches happen only in [`yield_now`], with
//! interrupts disabled.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::arch::{asm, global_asm};

use spin::Mutex;
use x86_64::instructions::interrupts;
use x86_64::VirtAddr;

use super::gdt;
use crate::task::{TaskError, TaskHandle, TaskState, TaskSubsystem};

const KERNEL_STACK_SIZE: usize = 16 * 1024;
const MAX_TASKS: usize = 8;
/// Callee-saved registers pushed by `switch_context`.
const SAVED_REGISTERS: usize = 6;

extern "C" {
    fn switch_context(save_rsp: *mut u64, next_rsp: u64);
    fn task_trampoline();
}

global_asm!(
    r#"
    .global switch_context
switch_context:
    push rbp
    push rbx
    push r12
    push r13
    push r14
    push r15
    mov [rdi], rsp
    mov rsp, rsi
    pop r15
    pop r14
    pop r13
    pop r12
    pop rbx
    pop rbp
    ret

    // First run of a new task: r12 = entry, r13 = user stack top, r14 = argument.
    .global task_trampoline
task_trampoline:
    mov rdi, r12
    mov rsi, r13
    mov rdx, r14
    and rsp, -16
    call task_enter_user
    ud2
"#
);

/// Register state `iretq` restores on the way to ring 3.
#[repr(C)]
struct UserFrame {
    rip: u64,
    cs: u64,
    rflags: u64,
    rsp: u64,
    ss: u64,
}

#[no_mangle]
extern "C" fn task_enter_user(entry: u64, stack_top: u64, arg: u64) -> ! {
    let selectors = gdt::selectors();
    let frame = UserFrame {
        rip: entry,
        cs: u64::from(selectors.user_code.0),
        // IF set, reserved bit 1
        rflags: 0x202,
        rsp: stack_top,
        ss: u64::from(selectors.user_data.0),
    };
    // SAFETY: entry and stack were mapped user-accessible before the task was created, and
    // the TSS holds this task's kernel stack.
    unsafe {
        asm!(
            "push qword ptr [{frame} + 32]",
            "push qword ptr [{frame} + 24]",
            "push qword ptr [{frame} + 16]",
            "push qword ptr [{frame} + 8]",
            "push qword ptr [{frame}]",
            "xor eax, eax",
            "iretq",
            frame = in(reg) &frame as *const UserFrame,
            in("rdi") arg,
            options(noreturn)
        );
    }
}

struct Task {
    handle: TaskHandle,
    state: TaskState,
    saved_rsp: u64,
    /// `None` for task 0, which keeps the boot stack.
    kernel_stack: Option<Box<[u8]>>,
}

impl Task {
    fn stack_top(&self) -> Option<VirtAddr> {
        self.kernel_stack
            .as_ref()
            .map(|stack| (VirtAddr::from_ptr(stack.as_ptr()) + stack.len() as u64).align_down(16u64))
    }
}

struct RunQueue {
    tasks: Vec<Box<Task>>,
    current: usize,
    initialized: bool,
}

static RUN_QUEUE: Mutex<RunQueue> = Mutex::new(RunQueue {
    tasks: Vec::new(),
    current: 0,
    initialized: false,
});

/// Switches to the next ready task. Returns `false` if there was none.
pub fn yield_now() -> bool {
    let were_enabled = interrupts::are_enabled();
    interrupts::disable();

    let switch = {
        let mut queue = RUN_QUEUE.lock();
        let count = queue.tasks.len();
        let current = queue.current;
        let next = (1..count)
            .map(|step| (current + step) % count)
            .find(|&i| queue.tasks[i].state == TaskState::Ready);

        next.map(|next| {
            if queue.tasks[current].state == TaskState::Running {
                queue.tasks[current].state = TaskState::Ready;
            }
            queue.tasks[next].state = TaskState::Running;
            queue.current = next;
            if let Some(top) = queue.tasks[next].stack_top() {
                gdt::set_kernel_stack(top);
            }
            let save: *mut u64 = &mut queue.tasks[current].saved_rsp;
            (save, queue.tasks[next].saved_rsp)
        })
    };

    if let Some((save, next_rsp)) = switch {
        // SAFETY: tasks are boxed and never removed, so `save` stays valid; `next_rsp` was
        // written by `switch_context` or prepared by `create`.
        unsafe { switch_context(save, next_rsp) };
    }

    if were_enabled {
        interrupts::enable();
    }
    switch.is_some()
}

pub struct Scheduler;

impl TaskSubsystem for Scheduler {
    fn init(&self) -> Result<(), TaskError> {
        let mut queue = RUN_QUEUE.lock();
        if !queue.initialized {
            queue.tasks.reserve_exact(MAX_TASKS);
            queue.initialized = true;
        }
        Ok(())
    }

    fn run_as_task0(&self) -> Result<TaskHandle, TaskError> {
        let mut queue = RUN_QUEUE.lock();
        if !queue.initialized {
            return Err(TaskError::NotInitialized);
        }
        if queue.tasks.is_empty() {
            queue.tasks.push(Box::new(Task {
                handle: TaskHandle(0),
                state: TaskState::Running,
                saved_rsp: 0,
                kernel_stack: None,
            }));
            queue.current = 0;
        }
        Ok(queue.tasks[0].handle)
    }

    fn create(&self, entry: u64, stack_top: u64, arg: u64) -> Result<TaskHandle, TaskError> {
        let mut queue = RUN_QUEUE.lock();
        if queue.tasks.is_empty() {
            return Err(TaskError::NotInitialized);
        }
        if queue.tasks.len() >= MAX_TASKS {
            return Err(TaskError::TooManyTasks);
        }

        let mut stack = vec![0u8; KERNEL_STACK_SIZE].into_boxed_slice();
        let top = (stack.as_ptr() as u64 + KERNEL_STACK_SIZE as u64) & !0xf;
        // Layout popped by switch_context: r15, r14, r13, r12, rbx, rbp, return address.
        let frame_base = top - 16 - (SAVED_REGISTERS as u64) * 8;
        let offset = (frame_base - stack.as_ptr() as u64) as usize;
        let initial: [u64; SAVED_REGISTERS + 1] = [
            0,
            arg,
            stack_top,
            entry,
            0,
            0,
            task_trampoline as usize as u64,
        ];
        for (i, value) in initial.iter().enumerate() {
            let at = offset + i * 8;
            stack[at..at + 8].copy_from_slice(&value.to_ne_bytes());
        }

        let handle = TaskHandle(queue.tasks.len() as u32);
        queue.tasks.push(Box::new(Task {
            handle,
            state: TaskState::Ready,
            saved_rsp: frame_base,
            kernel_stack: Some(stack),
        }));
        log::debug!("sched: task {} ready, entry {:#x}", handle.0, entry);
        Ok(handle)
    }

    fn yield_now(&self) {
        yield_now();
    }
}
