//! # Programmable Interrupt Controller (8259 PIC)
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │     │   PIC 2     │
//! │  (Master)   │────▶│  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! IRQ 0-15 are remapped to vectors 32-47. Every line starts masked; the kernel opens the
//! ones it installed handlers for.

use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::interrupts;

use crate::interrupts::IrqControl;

pub const PIC_1_OFFSET: u8 = 32; // Primary PIC handles IRQs 0-7
pub const PIC_2_OFFSET: u8 = 40; // Secondary PIC handles IRQs 8-15
const CASCADE_IRQ: u8 = 2;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

// Interrupt indices - these are the actual vector numbers the CPU sees
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET, // 32 - IRQ0, first of the 16 IRQ vectors
    Syscall = 0x80,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

pub fn init() -> Result<(), &'static str> {
    interrupts::without_interrupts(|| {
        let mut pics = PICS.lock();
        unsafe {
            pics.initialize();
            pics.write_masks(0xff, 0xff);
        }
    });
    Ok(())
}

/// Line masking through the chips' mask registers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pic8259;

fn with_masks<R>(f: impl FnOnce(&mut [u8; 2]) -> R) -> R {
    interrupts::without_interrupts(|| {
        let mut pics = PICS.lock();
        let mut masks = unsafe { pics.read_masks() };
        let before = masks;
        let result = f(&mut masks);
        if masks != before {
            unsafe { pics.write_masks(masks[0], masks[1]) };
        }
        result
    })
}

fn bit(irq: u8) -> (usize, u8) {
    (usize::from(irq / 8), 1 << (irq % 8))
}

impl IrqControl for Pic8259 {
    fn mask(&self, irq: u8) {
        let (chip, bit) = bit(irq);
        with_masks(|masks| masks[chip] |= bit);
    }

    fn unmask(&self, irq: u8) {
        let (chip, bit) = bit(irq);
        with_masks(|masks| {
            masks[chip] &= !bit;
            if chip == 1 {
                masks[0] &= !(1 << CASCADE_IRQ);
            }
        });
    }

    fn is_masked(&self, irq: u8) -> bool {
        let (chip, bit) = bit(irq);
        with_masks(|masks| masks[chip] & bit != 0)
    }

    fn end_of_interrupt(&self, irq: u8) {
        interrupts::without_interrupts(|| unsafe {
            PICS.lock().notify_end_of_interrupt(PIC_1_OFFSET + irq);
        });
    }
}
