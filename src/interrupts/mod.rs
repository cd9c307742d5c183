//! # Interrupt Handling
//!
//! Hardware-independent half of interrupt handling:
//!
//! - [`IrqControl`]: per-line masking and end-of-interrupt, implemented by the platform
//!   (the 8259 pair on x86_64)
//! - [`IrqLine`] / [`MaskedIrq`]: one line bound to its controller, and a guard that keeps
//!   it masked
//! - [`vectors`]: the IRQ → handler table the trap dispatcher calls into
//!
//! ## IRQ Assignments
//!
//! | IRQ | Device    |
//! |-----|-----------|
//! | 0   | Timer     |
//! | 1   | Keyboard  |

pub mod vectors;

pub use vectors::{isr_default, InterruptVectorTable, IrqHandler, VectorError};

/// Per-line interrupt controller operations.
pub trait IrqControl: Sync {
    fn mask(&self, irq: u8);
    fn unmask(&self, irq: u8);
    fn is_masked(&self, irq: u8) -> bool;
    fn end_of_interrupt(&self, irq: u8);
}

/// Register snapshot handed to IRQ handlers by the trap dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapContext {
    pub vector: u8,
    pub instruction_pointer: u64,
    pub stack_pointer: u64,
    pub from_user: bool,
}

/// One interrupt line of a controller.
#[derive(Clone, Copy)]
pub struct IrqLine<'a> {
    control: &'a dyn IrqControl,
    irq: u8,
}

impl<'a> IrqLine<'a> {
    pub fn new(control: &'a dyn IrqControl, irq: u8) -> Self {
        Self { control, irq }
    }

    pub fn irq(&self) -> u8 {
        self.irq
    }

    pub fn mask(&self) {
        self.control.mask(self.irq);
    }

    pub fn unmask(&self) {
        self.control.unmask(self.irq);
    }

    pub fn is_masked(&self) -> bool {
        self.control.is_masked(self.irq)
    }

    /// Masks the line until the guard drops, then restores its previous state.
    pub fn masked(&self) -> MaskedIrq<'_> {
        let was_masked = self.is_masked();
        self.mask();
        MaskedIrq { line: self, was_masked }
    }
}

#[must_use = "the line is unmasked again when the guard drops"]
pub struct MaskedIrq<'a> {
    line: &'a IrqLine<'a>,
    was_masked: bool,
}

impl Drop for MaskedIrq<'_> {
    fn drop(&mut self) {
        if !self.was_masked {
            self.line.unmask();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakePic;
    use super::*;

    #[test]
    fn test_masked_guard_restores_unmasked_line() {
        let pic = FakePic::default();
        let line = IrqLine::new(&pic, 1);
        {
            let _guard = line.masked();
            assert!(line.is_masked());
            assert!(!pic.is_masked(0));
        }
        assert!(!line.is_masked());
    }

    #[test]
    fn test_masked_guard_unmasks_once() {
        let pic = FakePic::default();
        let line = IrqLine::new(&pic, 3);
        drop(line.masked());
        assert_eq!(pic.unmask_calls.load(core::sync::atomic::Ordering::SeqCst), 1);

        pic.mask(3);
        drop(line.masked());
        assert_eq!(pic.unmask_calls.load(core::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_masked_guard_keeps_masked_line_masked() {
        let pic = FakePic::default();
        pic.mask(1);
        let line = IrqLine::new(&pic, 1);
        drop(line.masked());
        assert!(line.is_masked());
    }
}
