//! # PS/2 Keyboard Driver
//!
//! Turns IRQ1 scan codes into 16-bit key codes and hands them to one blocked reader.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   IRQ1    ┌──────────────────┐   store    ┌─────────────┐
//! │  Keyboard   │──────────▶│  handle_irq      │───────────▶│  CharSlot   │
//! │ (0x64/0x60) │           │  - modifiers     │   wake(1)  │  (1 code)   │
//! └─────────────┘           │  - translate     │─────┐      └──────┬──────┘
//!                           └──────────────────┘     │             │ take
//!                                                    ▼             ▼
//!                                              ┌───────────┐  ┌───────────┐
//!                                              │ WaitQueue │─▶│ read_char │
//!                                              └───────────┘  └───────────┘
//! ```
//!
//! ## Key Codes
//!
//! A produced code is `scan << 8 | ascii`. Release events come out as `scan << 8` with a
//! zero low byte (see [`ReleasePolicy`]). The slot holds one code: a second key before the
//! reader runs replaces the first.
//!
//! ## Concurrency
//!
//! The interrupt handler is the only producer and the only user of the modifier lock. The
//! reader masks IRQ1 for its whole critical section; the wait queue's suspension is the
//! only place the line opens again.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use spin::Mutex;

use crate::config::KBD_STATUS_READY;
use crate::interrupts::IrqLine;
use crate::task::WaitQueue;

pub mod modifiers;
pub mod scancodes;

pub use modifiers::ModifierState;
pub use scancodes::{translate, Column};

/// What happens to key-release codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Stored and delivered like characters.
    Forward,
    /// Treated as producing nothing.
    Drop,
}

/// Controller status and data ports.
pub trait KeyboardPorts {
    fn read_status(&self) -> u8;
    fn read_data(&self) -> u8;
}

/// State reached by one pass of the interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// Output buffer empty; nothing was read.
    NotReady,
    /// A modifier or lock key updated the state.
    StateChange,
    /// The code produces nothing.
    Suppressed,
    Produced(u16),
}

/// One pending key code.
pub struct CharSlot {
    code: AtomicU16,
    pending: AtomicBool,
}

impl CharSlot {
    pub const fn new() -> Self {
        Self {
            code: AtomicU16::new(0),
            pending: AtomicBool::new(false),
        }
    }

    pub fn store(&self, code: u16) {
        self.code.store(code, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn take(&self) -> u16 {
        self.pending.store(false, Ordering::Relaxed);
        self.code.load(Ordering::Acquire)
    }
}

impl Default for CharSlot {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Keyboard<Q> {
    modifiers: Mutex<ModifierState>,
    slot: CharSlot,
    queue: Q,
    policy: ReleasePolicy,
}

impl<Q: WaitQueue> Keyboard<Q> {
    pub const fn new(queue: Q, policy: ReleasePolicy) -> Self {
        Self {
            modifiers: Mutex::new(ModifierState::new()),
            slot: CharSlot::new(),
            queue,
            policy,
        }
    }

    /// IRQ1 body. Never blocks.
    pub fn handle_irq<P: KeyboardPorts + ?Sized>(&self, ports: &P) -> IrqOutcome {
        if ports.read_status() & KBD_STATUS_READY == 0 {
            return IrqOutcome::NotReady;
        }
        let scan = ports.read_data();

        let code = {
            let mut modifiers = self.modifiers.lock();
            if modifiers.apply_if_modifier(scan) {
                log::trace!("kbd: modifier {:#04x}", scan);
                return IrqOutcome::StateChange;
            }
            translate(scan, &modifiers)
        };

        if code == 0 || (scancodes::is_release(scan) && self.policy == ReleasePolicy::Drop) {
            return IrqOutcome::Suppressed;
        }

        self.slot.store(code);
        self.queue.wake(1);
        IrqOutcome::Produced(code)
    }

    /// Blocks until a key code is pending and returns it.
    ///
    /// `line` is the keyboard's interrupt line; it stays masked except while the caller
    /// is suspended on the wait queue.
    pub fn read_char(&self, line: &IrqLine<'_>) -> u16 {
        let _masked = line.masked();
        while !self.slot.is_pending() {
            self.queue.sleep(line);
        }
        self.slot.take()
    }

    /// Snapshot of the modifier flags. Masks `line` so the handler cannot interrupt the
    /// lock holder.
    pub fn modifiers(&self, line: &IrqLine<'_>) -> ModifierState {
        let _masked = line.masked();
        *self.modifiers.lock()
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::testing::FakePic;
    use crate::interrupts::IrqControl;
    use crate::task::wait_queue::testing::{MaskCheckingSuspend, YieldSuspend};
    use crate::task::TicketQueue;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    /// Reports ready while scripted bytes remain and records port accesses.
    #[derive(Default)]
    struct ScriptedPorts {
        bytes: RefCell<VecDeque<u8>>,
        log: RefCell<Vec<u16>>,
    }

    impl ScriptedPorts {
        fn with(bytes: &[u8]) -> Self {
            Self {
                bytes: RefCell::new(bytes.iter().copied().collect()),
                log: RefCell::new(Vec::new()),
            }
        }
    }

    impl KeyboardPorts for ScriptedPorts {
        fn read_status(&self) -> u8 {
            self.log.borrow_mut().push(0x64);
            if self.bytes.borrow().is_empty() {
                0
            } else {
                KBD_STATUS_READY
            }
        }

        fn read_data(&self) -> u8 {
            self.log.borrow_mut().push(0x60);
            self.bytes.borrow_mut().pop_front().unwrap_or(0)
        }
    }

    /// Counts wake-ups; sleeping would deadlock a single-threaded test.
    #[derive(Default)]
    struct CountingQueue {
        wakes: AtomicUsize,
    }

    impl WaitQueue for CountingQueue {
        fn sleep(&self, _line: &IrqLine<'_>) {
            panic!("reader slept with a character pending");
        }

        fn wake(&self, count: usize) -> usize {
            self.wakes.fetch_add(count, Ordering::SeqCst);
            0
        }

        fn waiters(&self) -> usize {
            0
        }
    }

    fn keyboard(policy: ReleasePolicy) -> Keyboard<CountingQueue> {
        Keyboard::new(CountingQueue::default(), policy)
    }

    #[test]
    fn test_not_ready_reads_no_data() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let ports = ScriptedPorts::default();
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::NotReady);
        assert_eq!(*ports.log.borrow(), vec![0x64]);
        assert_eq!(kbd.queue().wakes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_status_checked_before_data() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let ports = ScriptedPorts::with(&[0x1E]);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Produced(0x1E61));
        assert_eq!(*ports.log.borrow(), vec![0x64, 0x60]);
        assert_eq!(kbd.queue().wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_modifier_changes_translation() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let pic = FakePic::new();
        let line = IrqLine::new(&pic, 1);
        let ports = ScriptedPorts::with(&[0x2A, 0x1E, 0xAA, 0x1E]);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::StateChange);
        assert!(kbd.modifiers(&line).left_shift);
        assert!(!line.is_masked());
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Produced(0x1E41));
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::StateChange);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Produced(0x1E61));
        assert_eq!(kbd.queue().wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_prefix_suppressed_without_wake() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let ports = ScriptedPorts::with(&[0xE0, 0xE1, 0x7F]);
        for _ in 0..3 {
            assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Suppressed);
        }
        assert_eq!(kbd.queue().wakes.load(Ordering::SeqCst), 0);
        assert!(!kbd.slot.is_pending());
    }

    #[test]
    fn test_release_policy() {
        let forward = keyboard(ReleasePolicy::Forward);
        assert_eq!(
            forward.handle_irq(&ScriptedPorts::with(&[0x9E])),
            IrqOutcome::Produced(0x9E00)
        );

        let drop = keyboard(ReleasePolicy::Drop);
        assert_eq!(
            drop.handle_irq(&ScriptedPorts::with(&[0x9E])),
            IrqOutcome::Suppressed
        );
        assert!(!drop.slot.is_pending());
    }

    #[test]
    fn test_drop_policy_keeps_release_shaped_presses() {
        let kbd = keyboard(ReleasePolicy::Drop);
        let ports = ScriptedPorts::with(&[0x38, 0x0A, 0x8A, 0xB8]);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::StateChange);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Produced(0x8000));
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::Suppressed);
        assert_eq!(kbd.handle_irq(&ports), IrqOutcome::StateChange);
        assert_eq!(kbd.queue().wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_key_overwrites_first() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let pic = FakePic::new();
        let line = IrqLine::new(&pic, 1);
        let ports = ScriptedPorts::with(&[0x1E, 0x30]);

        kbd.handle_irq(&ports);
        kbd.handle_irq(&ports);

        assert_eq!(kbd.read_char(&line), 0x3062);
        assert!(!kbd.slot.is_pending());
    }

    #[test]
    fn test_pending_read_does_not_sleep_and_unmasks() {
        let kbd = keyboard(ReleasePolicy::Forward);
        let pic = FakePic::new();
        let line = IrqLine::new(&pic, 1);

        kbd.handle_irq(&ScriptedPorts::with(&[0x1E]));
        assert_eq!(kbd.read_char(&line), 0x1E61);
        assert!(!pic.is_masked(1));
    }

    #[test]
    fn test_blocked_reader_woken_by_interrupt() {
        static PIC: FakePic = FakePic::new();
        let kbd = Arc::new(Keyboard::new(
            TicketQueue::new(YieldSuspend),
            ReleasePolicy::Forward,
        ));

        let reader = {
            let kbd = kbd.clone();
            thread::spawn(move || kbd.read_char(&IrqLine::new(&PIC, 1)))
        };

        while kbd.queue().waiters() == 0 {
            thread::yield_now();
        }
        assert_eq!(
            kbd.handle_irq(&ScriptedPorts::with(&[0x10])),
            IrqOutcome::Produced(0x1071)
        );

        assert_eq!(reader.join().unwrap(), 0x1071);
        assert_eq!(kbd.queue().waiters(), 0);
    }

    #[test]
    fn test_spurious_wake_sleeps_again() {
        static PIC: FakePic = FakePic::new();
        let kbd = Arc::new(Keyboard::new(
            TicketQueue::new(YieldSuspend),
            ReleasePolicy::Forward,
        ));

        let reader = {
            let kbd = kbd.clone();
            thread::spawn(move || kbd.read_char(&IrqLine::new(&PIC, 1)))
        };

        while kbd.queue().waiters() == 0 {
            thread::yield_now();
        }
        assert_eq!(kbd.queue().wake(1), 1);
        while kbd.queue().waiters() == 0 {
            thread::yield_now();
        }
        assert!(!reader.is_finished());

        kbd.handle_irq(&ScriptedPorts::with(&[0x2C]));
        assert_eq!(reader.join().unwrap(), 0x2C7A);
    }

    #[test]
    fn test_reader_suspends_only_with_line_masked() {
        static PIC: FakePic = FakePic::new();
        static SUSPEND: MaskCheckingSuspend = MaskCheckingSuspend::new();
        let kbd = Arc::new(Keyboard::new(
            TicketQueue::new(&SUSPEND),
            ReleasePolicy::Forward,
        ));

        let reader = {
            let kbd = kbd.clone();
            thread::spawn(move || kbd.read_char(&IrqLine::new(&PIC, 1)))
        };

        while SUSPEND.suspends.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }
        kbd.handle_irq(&ScriptedPorts::with(&[0x1E]));
        assert_eq!(reader.join().unwrap(), 0x1E61);

        let suspends = SUSPEND.suspends.load(Ordering::SeqCst);
        assert_eq!(SUSPEND.entered_unmasked.load(Ordering::SeqCst), 0);
        // One opening per suspension, plus the guard restoring the line at the end.
        assert_eq!(PIC.unmask_calls.load(Ordering::SeqCst), suspends + 1);
        assert!(!PIC.is_masked(1));
    }
}
