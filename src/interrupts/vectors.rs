//! IRQ number → handler table.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::config::NR_IRQ;

use super::TrapContext;

/// Handler for one IRQ line. `C` is the kernel context the handler reaches devices through.
pub type IrqHandler<C> = fn(&C, u8, &TrapContext);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorError {
    OutOfRange(u8),
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorError::OutOfRange(irq) => write!(f, "IRQ {} outside 0..{}", irq, NR_IRQ),
        }
    }
}

/// Fallback for lines nobody installed a handler for.
pub fn isr_default<C>(_ctx: &C, irq: u8, frame: &TrapContext) {
    log::trace!("unexpected IRQ {} at {:#x}", irq, frame.instruction_pointer);
}

pub struct InterruptVectorTable<C> {
    handlers: [IrqHandler<C>; NR_IRQ],
    installed: AtomicU32,
    unhandled: AtomicUsize,
}

impl<C> InterruptVectorTable<C> {
    /// Every entry starts out as [`isr_default`].
    pub fn new() -> Self {
        Self {
            handlers: [isr_default::<C> as IrqHandler<C>; NR_IRQ],
            installed: AtomicU32::new(0),
            unhandled: AtomicUsize::new(0),
        }
    }

    /// Replaces the handler for `irq`. Installation happens before the line is unmasked.
    pub fn install(&mut self, irq: u8, handler: IrqHandler<C>) -> Result<(), VectorError> {
        let slot = self
            .handlers
            .get_mut(irq as usize)
            .ok_or(VectorError::OutOfRange(irq))?;
        *slot = handler;
        self.installed.fetch_or(1 << irq, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_installed(&self, irq: u8) -> bool {
        (irq as usize) < NR_IRQ && self.installed.load(Ordering::Relaxed) & (1 << irq) != 0
    }

    /// Runs the handler for `irq`. Out-of-range numbers and uninstalled lines are counted.
    pub fn dispatch(&self, ctx: &C, irq: u8, frame: &TrapContext) {
        let Some(handler) = self.handlers.get(irq as usize) else {
            self.unhandled.fetch_add(1, Ordering::Relaxed);
            log::trace!("IRQ {} has no vector slot", irq);
            return;
        };
        if !self.is_installed(irq) {
            self.unhandled.fetch_add(1, Ordering::Relaxed);
        }
        handler(ctx, irq, frame);
    }

    /// Interrupts that reached the default handler or no slot at all.
    pub fn unhandled_count(&self) -> usize {
        self.unhandled.load(Ordering::Relaxed)
    }
}

impl<C> Default for InterruptVectorTable<C> {
    fn default() -> Self {
        Self::new()
    }
}
