//! FIFO wait queue.
//!
//! A sleeper draws a ticket and suspends until the number of granted wake-ups passes its
//! ticket. `wake(n)` grants at most as many wake-ups as there are sleepers, so a wake with
//! nobody waiting is lost rather than banked; data that outlives a wake is the caller's
//! business (the keyboard keeps a pending flag for that).

use core::sync::atomic::{AtomicU64, Ordering};

use crate::interrupts::IrqLine;

pub trait WaitQueue: Sync {
    /// Sleeps until woken. Called with `line` masked; returns with it masked.
    fn sleep(&self, line: &IrqLine<'_>);

    /// Wakes up to `count` sleepers in arrival order and returns how many were woken.
    fn wake(&self, count: usize) -> usize;

    fn waiters(&self) -> usize;
}

/// Suspends the calling thread once. The implementation opens `line` only for the duration
/// of the suspension and must do so atomically with going to sleep.
pub trait Suspend: Sync {
    fn suspend(&self, line: &IrqLine<'_>);
}

impl<S: Suspend + ?Sized> Suspend for &S {
    fn suspend(&self, line: &IrqLine<'_>) {
        (**self).suspend(line)
    }
}

pub struct TicketQueue<S> {
    next_ticket: AtomicU64,
    granted: AtomicU64,
    suspend: S,
}

impl<S: Suspend> TicketQueue<S> {
    pub const fn new(suspend: S) -> Self {
        Self {
            next_ticket: AtomicU64::new(0),
            granted: AtomicU64::new(0),
            suspend,
        }
    }
}

impl<S: Suspend> WaitQueue for TicketQueue<S> {
    fn sleep(&self, line: &IrqLine<'_>) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        while self.granted.load(Ordering::Acquire) <= ticket {
            self.suspend.suspend(line);
        }
    }

    fn wake(&self, count: usize) -> usize {
        let mut granted = self.granted.load(Ordering::Acquire);
        loop {
            let issued = self.next_ticket.load(Ordering::Acquire);
            let woken = (issued - granted).min(count as u64);
            if woken == 0 {
                return 0;
            }
            match self.granted.compare_exchange_weak(
                granted,
                granted + woken,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return woken as usize,
                Err(current) => granted = current,
            }
        }
    }

    fn waiters(&self) -> usize {
        let issued = self.next_ticket.load(Ordering::Acquire);
        (issued - self.granted.load(Ordering::Acquire)) as usize
    }
}


#[cfg(test)]
mod tests {
    use super::testing::YieldSuspend;
    use super::*;
    use crate::interrupts::testing::FakePic;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn test_wake_without_waiters_is_lost() {
        let queue = TicketQueue::new(YieldSuspend);
        assert_eq!(queue.wake(1), 0);
        assert_eq!(queue.waiters(), 0);
    }

    #[test]
    fn test_wake_one_of_two() {
        static PIC: FakePic = FakePic::new();
        let queue = Arc::new(TicketQueue::new(YieldSuspend));
        let done = Arc::new(AtomicUsize::new(0));

        let sleepers: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let line = IrqLine::new(&PIC, 1);
                    queue.sleep(&line);
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        while queue.waiters() < 2 {
            thread::yield_now();
        }
        assert_eq!(queue.wake(1), 1);
        while done.load(Ordering::SeqCst) < 1 {
            thread::yield_now();
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(queue.waiters(), 1);

        assert_eq!(queue.wake(5), 1);
        for sleeper in sleepers {
            sleeper.join().unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fifo_order() {
        static PIC: FakePic = FakePic::new();
        let queue = Arc::new(TicketQueue::new(YieldSuspend));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut sleepers = Vec::new();
        for id in 0..3 {
            let sleeper_queue = queue.clone();
            let order = order.clone();
            sleepers.push(thread::spawn(move || {
                let line = IrqLine::new(&PIC, 1);
                sleeper_queue.sleep(&line);
                order.lock().unwrap().push(id);
            }));
            while queue.waiters() < id + 1 {
                thread::yield_now();
            }
        }

        for woken in 1..=3 {
            assert_eq!(queue.wake(1), 1);
            while order.lock().unwrap().len() < woken {
                thread::yield_now();
            }
        }
        for sleeper in sleepers {
            sleeper.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
