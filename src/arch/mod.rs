//! # x86_64 PC Platform
//!
//! Everything that touches the machine directly:
//!
//! - `gdt`: segments, TSS, per-task ring-0 stack
//! - `idt`: exception handlers, IRQ stubs, `int 0x80` entry, IDT relocation
//! - `pic`: 8259 pair and per-line masking
//! - `paging`: the kernel address space on the live page tables
//! - `heap`: global allocator
//! - `sched`: cooperative scheduler and the jump to ring 3
//! - `serial`: COM1 console and logger

use spin::Once;
use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;
use x86_64::registers::model_specific::{Efer, EferFlags};

use crate::config::{PORT_KBD_DATA, PORT_KBD_STATUS};
use crate::devices::drivers::ps2_keyboard::KeyboardPorts;
use crate::interrupts::{IrqControl, IrqLine};
use crate::kernel::{Kernel, Platform};
use crate::task::Suspend;

pub mod gdt;
pub mod heap;
pub mod idt;
pub mod paging;
pub mod pic;
pub mod sched;
pub mod serial;
pub mod user_program;

/// The kernel context, published once boot has built it.
pub static KERNEL: Once<Kernel<Pc>> = Once::new();

#[derive(Debug, Default, Clone, Copy)]
pub struct Pc {
    pic: pic::Pic8259,
}

impl Pc {
    pub const fn new() -> Self {
        Self { pic: pic::Pic8259 }
    }
}

impl IrqControl for Pc {
    fn mask(&self, irq: u8) {
        self.pic.mask(irq)
    }

    fn unmask(&self, irq: u8) {
        self.pic.unmask(irq)
    }

    fn is_masked(&self, irq: u8) -> bool {
        self.pic.is_masked(irq)
    }

    fn end_of_interrupt(&self, irq: u8) {
        self.pic.end_of_interrupt(irq)
    }
}

impl KeyboardPorts for Pc {
    fn read_status(&self) -> u8 {
        unsafe { Port::<u8>::new(PORT_KBD_STATUS).read() }
    }

    fn read_data(&self) -> u8 {
        unsafe { Port::<u8>::new(PORT_KBD_DATA).read() }
    }
}

impl Platform for Pc {
    type Suspend = HaltSuspend;
}

/// Gives the CPU to another ready task, or halts until the next interrupt.
pub struct HaltSuspend;

impl Suspend for HaltSuspend {
    fn suspend(&self, line: &IrqLine<'_>) {
        let were_enabled = interrupts::are_enabled();
        interrupts::disable();
        line.unmask();
        if !sched::yield_now() {
            // sti takes effect after hlt, so no interrupt slips in between
            interrupts::enable_and_hlt();
        }
        interrupts::disable();
        line.mask();
        if were_enabled {
            interrupts::enable();
        }
    }
}

/// Descriptor tables and CPU features the rest of boot depends on.
pub fn init_cpu() -> Result<(), &'static str> {
    gdt::init();
    idt::init_idt();
    // SAFETY: only adds NX support; leaf mappings set NO_EXECUTE on data pages.
    unsafe { Efer::update(|flags| flags.insert(EferFlags::NO_EXECUTE_ENABLE)) };
    Ok(())
}

pub fn halt_loop() -> ! {
    interrupts::disable();
    loop {
        x86_64::instructions::hlt();
    }
}
