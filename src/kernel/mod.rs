//! # Kernel Context
//!
//! [`Kernel`] owns everything the interrupt and system-call paths share: the vector table,
//! the keyboard driver with its slot and wait queue, and the tick counter. It is built once
//! in `kernel_main`, handlers are installed before it is published, and from then on it is
//! only reached through `&Kernel`.
//!
//! ## Submodules
//!
//! - `init`: boot phase runner
//! - `status`: component status tracking for the boot log

use core::sync::atomic::{AtomicU64, Ordering};

use crate::config::{KernelConfig, IRQ_KEYBOARD, IRQ_TIMER};
use crate::devices::drivers::ps2_keyboard::{IrqOutcome, Keyboard, KeyboardPorts};
use crate::interrupts::{InterruptVectorTable, IrqControl, IrqLine, TrapContext, VectorError};
use crate::syscalls::SyscallHost;
use crate::task::{Suspend, TicketQueue};
use crate::time::{delay_loops, CalibrationError, DelayLoop, TickSource};

pub mod init;
pub mod status;

pub use init::{init_phase, register_boot_phases};
pub use status::{register_component, update_component_status, InitStatus};

/// Hardware the kernel context drives directly.
pub trait Platform: IrqControl + KeyboardPorts + Sync {
    type Suspend: Suspend;
}

pub struct Kernel<P: Platform> {
    platform: P,
    vectors: InterruptVectorTable<Kernel<P>>,
    keyboard: Keyboard<TicketQueue<P::Suspend>>,
    ticks: AtomicU64,
    delay: DelayLoop,
}

impl<P: Platform> Kernel<P> {
    /// Builds the context with the timer and keyboard handlers installed. Lines stay masked
    /// until [`Kernel::enable_irqs`].
    pub fn new(platform: P, suspend: P::Suspend, config: &KernelConfig) -> Result<Self, VectorError> {
        let mut vectors = InterruptVectorTable::new();
        vectors.install(IRQ_TIMER, isr_timer::<P>)?;
        vectors.install(IRQ_KEYBOARD, isr_keyboard::<P>)?;

        Ok(Self {
            platform,
            vectors,
            keyboard: Keyboard::new(TicketQueue::new(suspend), config.release_policy),
            ticks: AtomicU64::new(0),
            delay: DelayLoop::new(),
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn keyboard(&self) -> &Keyboard<TicketQueue<P::Suspend>> {
        &self.keyboard
    }

    /// Opens every line that has a handler.
    pub fn enable_irqs(&self) {
        for irq in [IRQ_TIMER, IRQ_KEYBOARD] {
            if self.vectors.is_installed(irq) {
                self.platform.unmask(irq);
            }
        }
    }

    /// Entry from the trap dispatcher for hardware interrupt `irq`.
    pub fn dispatch_irq(&self, irq: u8, frame: &TrapContext) {
        self.vectors.dispatch(self, irq, frame);
    }

    /// Blocks until the keyboard produces a code.
    pub fn read_char(&self) -> u16 {
        let line = IrqLine::new(&self.platform, IRQ_KEYBOARD);
        self.keyboard.read_char(&line)
    }

    /// Measures the delay loop against the timer. Needs the timer line open.
    pub fn calibrate_delay(&self) -> Result<u64, CalibrationError> {
        self.delay.calibrate(self, delay_loops)
    }

    pub fn loops_per_tick(&self) -> Option<u64> {
        self.delay.loops_per_tick()
    }

    /// Busy-waits for about `ticks` timer ticks.
    pub fn delay(&self, ticks: u64) {
        self.delay.delay_ticks(self, ticks, delay_loops)
    }

    pub fn unhandled_irqs(&self) -> usize {
        self.vectors.unhandled_count()
    }
}

impl<P: Platform> TickSource for Kernel<P> {
    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl<P: Platform> SyscallHost for Kernel<P> {
    fn get_char(&self) -> u16 {
        self.read_char()
    }

    fn ticks(&self) -> u64 {
        TickSource::ticks(self)
    }
}

fn isr_timer<P: Platform>(kernel: &Kernel<P>, _irq: u8, _frame: &TrapContext) {
    kernel.ticks.fetch_add(1, Ordering::Relaxed);
}

fn isr_keyboard<P: Platform>(kernel: &Kernel<P>, _irq: u8, _frame: &TrapContext) {
    match kernel.keyboard.handle_irq(&kernel.platform) {
        IrqOutcome::Produced(code) => log::trace!("kbd: {:#06x}", code),
        outcome => log::trace!("kbd: {:?}", outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KBD_STATUS_READY;
    use crate::devices::drivers::ps2_keyboard::ReleasePolicy;
    use crate::interrupts::testing::FakePic;
    use crate::task::wait_queue::testing::YieldSuspend;
    use crate::task::WaitQueue;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    struct FakeBoard {
        pic: FakePic,
        scan_codes: Mutex<VecDeque<u8>>,
    }

    impl FakeBoard {
        fn new() -> Self {
            Self {
                pic: FakePic::all_masked(),
                scan_codes: Mutex::new(VecDeque::new()),
            }
        }

        fn press(&self, scan: u8) {
            self.scan_codes.lock().unwrap().push_back(scan);
        }
    }

    impl IrqControl for FakeBoard {
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

    impl KeyboardPorts for FakeBoard {
        fn read_status(&self) -> u8 {
            if self.scan_codes.lock().unwrap().is_empty() {
                0
            } else {
                KBD_STATUS_READY
            }
        }

        fn read_data(&self) -> u8 {
            self.scan_codes.lock().unwrap().pop_front().unwrap_or(0)
        }
    }

    impl Platform for FakeBoard {
        type Suspend = YieldSuspend;
    }

    fn kernel() -> Kernel<FakeBoard> {
        Kernel::new(FakeBoard::new(), YieldSuspend, &KernelConfig::default()).unwrap()
    }

    #[test]
    fn test_enable_irqs_opens_installed_lines_only() {
        let kernel = kernel();
        assert!(kernel.platform().is_masked(IRQ_KEYBOARD));

        kernel.enable_irqs();

        assert!(!kernel.platform().is_masked(IRQ_TIMER));
        assert!(!kernel.platform().is_masked(IRQ_KEYBOARD));
        for irq in 2..16 {
            assert!(kernel.platform().is_masked(irq));
        }
    }

    #[test]
    fn test_timer_counts_ticks() {
        let kernel = kernel();
        for _ in 0..3 {
            kernel.dispatch_irq(IRQ_TIMER, &TrapContext::default());
        }
        assert_eq!(TickSource::ticks(&kernel), 3);
        assert_eq!(SyscallHost::ticks(&kernel), 3);
    }

    #[test]
    fn test_unexpected_irq_counted() {
        let kernel = kernel();
        kernel.dispatch_irq(7, &TrapContext::default());
        kernel.dispatch_irq(15, &TrapContext::default());
        assert_eq!(kernel.unhandled_irqs(), 2);
        assert_eq!(TickSource::ticks(&kernel), 0);
    }

    #[test]
    fn test_keyboard_irq_feeds_reader() {
        let kernel = kernel();
        kernel.platform().press(0x2A);
        kernel.dispatch_irq(IRQ_KEYBOARD, &TrapContext::default());
        kernel.platform().press(0x23);
        kernel.dispatch_irq(IRQ_KEYBOARD, &TrapContext::default());

        assert_eq!(kernel.get_char(), 0x2348);
        assert!(kernel.platform().is_masked(IRQ_KEYBOARD));
    }

    #[test]
    fn test_blocked_syscall_reader_wakes() {
        let kernel = Arc::new(kernel());
        kernel.enable_irqs();

        let reader = {
            let kernel = kernel.clone();
            thread::spawn(move || kernel.get_char())
        };
        while kernel.keyboard().queue().waiters() == 0 {
            thread::yield_now();
        }

        kernel.platform().press(0x9C);
        kernel.dispatch_irq(IRQ_KEYBOARD, &TrapContext::default());

        assert_eq!(reader.join().unwrap(), 0x9C00);
        assert!(!kernel.platform().is_masked(IRQ_KEYBOARD));
    }

    #[test]
    fn test_drop_policy_from_config() {
        let config = KernelConfig {
            release_policy: ReleasePolicy::Drop,
            ..KernelConfig::default()
        };
        let kernel = Kernel::new(FakeBoard::new(), YieldSuspend, &config).unwrap();
        kernel.platform().press(0x9C);
        kernel.dispatch_irq(IRQ_KEYBOARD, &TrapContext::default());
        assert_eq!(kernel.keyboard().policy(), ReleasePolicy::Drop);
        assert_eq!(kernel.unhandled_irqs(), 0);
    }

    #[test]
    fn test_delay_calibrated_against_timer_irq() {
        let kernel = Arc::new(kernel());
        assert_eq!(kernel.loops_per_tick(), None);

        let stop = Arc::new(AtomicBool::new(false));
        let timer = {
            let kernel = kernel.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    kernel.dispatch_irq(IRQ_TIMER, &TrapContext::default());
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        let loops = kernel.calibrate_delay().unwrap();
        assert!(loops > 0);
        assert_eq!(kernel.loops_per_tick(), Some(loops));
        kernel.delay(2);

        stop.store(true, Ordering::SeqCst);
        timer.join().unwrap();
    }
}
