use core::arch::global_asm;
use core::mem::size_of;

use spin::Lazy;
use x86_64::instructions::tables::lidt;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};
use x86_64::structures::DescriptorTablePointer;
use x86_64::{PrivilegeLevel, VirtAddr};

use super::gdt;
use super::pic::{InterruptIndex, Pic8259, PIC_1_OFFSET};
use crate::config::NR_IRQ;
use crate::interrupts::{IrqControl, TrapContext};
use crate::syscalls::{dispatch_syscall, encode_result, SyscallContext};

extern "C" {
    fn syscall_entry();
}

// int 0x80: rax = number, rdi/rsi/rdx = arguments, result in rax.
global_asm!(
    r#"
    .global syscall_entry
syscall_entry:
    push rcx
    push rdx
    push rsi
    push rdi
    push r8
    push r9
    push r10
    push r11
    // SysV wants 16-byte alignment at the call
    sub rsp, 8

    mov rcx, rdx
    mov rdx, rsi
    mov rsi, rdi
    mov rdi, rax
    call syscall_dispatch

    add rsp, 8
    pop r11
    pop r10
    pop r9
    pop r8
    pop rdi
    pop rsi
    pop rdx
    pop rcx
    iretq
"#
);

#[no_mangle]
extern "C" fn syscall_dispatch(number: usize, arg0: usize, arg1: usize, arg2: usize) -> usize {
    let ctx = SyscallContext::from_registers(number, arg0, arg1, arg2);
    match super::KERNEL.get() {
        Some(kernel) => encode_result(dispatch_syscall(kernel, ctx)),
        None => usize::MAX,
    }
}

fn handle_irq(irq: u8, frame: &InterruptStackFrame) {
    let ctx = TrapContext {
        vector: PIC_1_OFFSET + irq,
        instruction_pointer: frame.instruction_pointer.as_u64(),
        stack_pointer: frame.stack_pointer.as_u64(),
        from_user: frame.code_segment.rpl() == PrivilegeLevel::Ring3,
    };
    if let Some(kernel) = super::KERNEL.get() {
        kernel.dispatch_irq(irq, &ctx);
    }
    Pic8259.end_of_interrupt(irq);
}

macro_rules! irq_stubs {
    ($($name:ident => $irq:literal),* $(,)?) => {
        $(
            extern "x86-interrupt" fn $name(frame: InterruptStackFrame) {
                handle_irq($irq, &frame);
            }
        )*

        const IRQ_STUBS: [extern "x86-interrupt" fn(InterruptStackFrame); NR_IRQ] = [$($name),*];
    };
}

irq_stubs! {
    irq0 => 0, irq1 => 1, irq2 => 2, irq3 => 3,
    irq4 => 4, irq5 => 5, irq6 => 6, irq7 => 7,
    irq8 => 8, irq9 => 9, irq10 => 10, irq11 => 11,
    irq12 => 12, irq13 => 13, irq14 => 14, irq15 => 15,
}

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    // CPU EXCEPTIONS (0-31)
    idt.breakpoint.set_handler_fn(breakpoint_handler);
    idt.page_fault.set_handler_fn(page_fault_handler);
    idt.divide_error.set_handler_fn(divide_error_handler);
    idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
    idt.general_protection_fault
        .set_handler_fn(general_protection_fault_handler);
    // Double fault needs its own stack to avoid cascading failures
    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }

    // HARDWARE INTERRUPTS (32-47 after remapping)
    for (irq, stub) in IRQ_STUBS.iter().enumerate() {
        idt[InterruptIndex::Timer.as_u8() + irq as u8].set_handler_fn(*stub);
    }

    // SAFETY: `syscall_entry` saves every caller-saved register it touches and returns
    // with iretq.
    unsafe {
        idt[InterruptIndex::Syscall.as_u8()]
            .set_handler_addr(VirtAddr::new(syscall_entry as usize as u64))
            .set_privilege_level(PrivilegeLevel::Ring3);
    }

    idt
});

pub fn init_idt() {
    IDT.load();
}

/// Copies the IDT into the page at `va` and points the CPU at the copy.
///
/// # Safety
///
/// `va` must map one writable page that stays mapped and untouched for the rest of the
/// kernel's life.
pub unsafe fn relocate(va: VirtAddr) {
    let size = size_of::<InterruptDescriptorTable>();
    core::ptr::copy_nonoverlapping(
        &*IDT as *const InterruptDescriptorTable as *const u8,
        va.as_mut_ptr::<u8>(),
        size,
    );
    lidt(&DescriptorTablePointer {
        limit: (size - 1) as u16,
        base: va,
    });
}

extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    log::warn!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: DIVIDE BY ZERO\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: INVALID OPCODE\n{:#?}", stack_frame);
}

extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "EXCEPTION: GENERAL PROTECTION FAULT (error code: {})\n{:#?}",
        error_code, stack_frame
    );
}

extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{stack_frame:#?}\n CODE{error_code}");
}

extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;

    log::error!("EXCEPTION: PAGE FAULT");
    log::error!("Accessed Address: {:?}", Cr2::read());
    log::error!("Error Code: {:?}", error_code);
    log::error!("{:#?}", stack_frame);

    panic!("Page fault!");
}
