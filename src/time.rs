//! Timer ticks and the calibrated delay loop.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Refinement passes after the coarse power-of-two search.
const PRECISION_BITS: u32 = 8;
/// Polls of the tick counter before the clock counts as stopped.
const MAX_TICK_POLLS: u64 = 1 << 32;
const MAX_LOOPS_PER_TICK: u64 = 1 << 40;

pub trait TickSource {
    fn ticks(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// The tick counter did not move; timer interrupts are not arriving.
    ClockStopped,
    /// Even the longest loop finished inside one tick.
    TooFast,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::ClockStopped => write!(f, "timer not ticking"),
            CalibrationError::TooFast => write!(f, "delay loop never spans a tick"),
        }
    }
}

/// Busy loop used for short hardware delays.
#[inline(never)]
pub fn delay_loops(loops: u64) {
    for _ in 0..loops {
        core::hint::spin_loop();
    }
}

fn wait_for_tick<T: TickSource + ?Sized>(clock: &T, max_polls: u64) -> Result<u64, CalibrationError> {
    let start = clock.ticks();
    for _ in 0..max_polls {
        let now = clock.ticks();
        if now != start {
            return Ok(now);
        }
        core::hint::spin_loop();
    }
    Err(CalibrationError::ClockStopped)
}

/// Measures how many iterations of `delay` fit in one tick of `clock`.
///
/// Doubles the loop count until one run crosses a tick boundary, then refines the bits
/// below the last count that did not.
pub fn calibrate_delay<T, D>(clock: &T, delay: D) -> Result<u64, CalibrationError>
where
    T: TickSource + ?Sized,
    D: Fn(u64),
{
    calibrate_with_limit(clock, delay, MAX_TICK_POLLS)
}

fn calibrate_with_limit<T, D>(clock: &T, delay: D, max_polls: u64) -> Result<u64, CalibrationError>
where
    T: TickSource + ?Sized,
    D: Fn(u64),
{
    let spans_tick = |loops: u64| -> Result<bool, CalibrationError> {
        let start = wait_for_tick(clock, max_polls)?;
        delay(loops);
        Ok(clock.ticks() != start)
    };

    let mut loops_per_tick = 1u64;
    while !spans_tick(loops_per_tick)? {
        loops_per_tick <<= 1;
        if loops_per_tick > MAX_LOOPS_PER_TICK {
            return Err(CalibrationError::TooFast);
        }
    }

    loops_per_tick >>= 1;
    let mut bit = loops_per_tick;
    for _ in 0..PRECISION_BITS {
        bit >>= 1;
        if bit == 0 {
            break;
        }
        loops_per_tick |= bit;
        if spans_tick(loops_per_tick)? {
            loops_per_tick &= !bit;
        }
    }

    log::info!("delay: {} loops per tick", loops_per_tick);
    Ok(loops_per_tick)
}

/// Loops-per-tick measured at boot, and busy waits built on it.
pub struct DelayLoop {
    loops_per_tick: AtomicU64,
}

impl DelayLoop {
    pub const fn new() -> Self {
        Self {
            loops_per_tick: AtomicU64::new(0),
        }
    }

    /// Runs [`calibrate_delay`] and keeps the result.
    pub fn calibrate<T, D>(&self, clock: &T, delay: D) -> Result<u64, CalibrationError>
    where
        T: TickSource + ?Sized,
        D: Fn(u64),
    {
        let loops = calibrate_delay(clock, delay)?;
        self.loops_per_tick.store(loops, Ordering::Relaxed);
        Ok(loops)
    }

    pub fn loops_per_tick(&self) -> Option<u64> {
        match self.loops_per_tick.load(Ordering::Relaxed) {
            0 => None,
            loops => Some(loops),
        }
    }

    /// Busy-waits for about `ticks` timer ticks.
    ///
    /// Before calibration this polls `clock` instead, which needs timer interrupts.
    pub fn delay_ticks<T, D>(&self, clock: &T, ticks: u64, delay: D)
    where
        T: TickSource + ?Sized,
        D: Fn(u64),
    {
        match self.loops_per_tick() {
            Some(loops) => delay(loops.saturating_mul(ticks)),
            None => {
                let start = clock.ticks();
                while clock.ticks().wrapping_sub(start) < ticks {
                    core::hint::spin_loop();
                }
            }
        }
    }
}

impl Default for DelayLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Simulated time in loop iterations; every poll costs one iteration.
    struct LoopClock {
        now: Cell<u64>,
        loops_per_tick: u64,
    }

    impl TickSource for LoopClock {
        fn ticks(&self) -> u64 {
            self.now.set(self.now.get() + 1);
            self.now.get() / self.loops_per_tick
        }
    }

    #[test]
    fn test_calibration_close_to_real_rate() {
        for rate in [10_000u64, 123_457, 3] {
            let clock = LoopClock {
                now: Cell::new(17),
                loops_per_tick: rate,
            };
            let measured =
                calibrate_delay(&clock, |loops| clock.now.set(clock.now.get() + loops)).unwrap();
            assert!(measured <= rate, "rate {} measured {}", rate, measured);
            assert!(measured >= rate - rate / 50 - 2, "rate {} measured {}", rate, measured);
        }
    }

    struct StoppedClock;

    impl TickSource for StoppedClock {
        fn ticks(&self) -> u64 {
            7
        }
    }

    #[test]
    fn test_stopped_clock() {
        assert_eq!(
            calibrate_with_limit(&StoppedClock, |_| {}, 1000),
            Err(CalibrationError::ClockStopped)
        );
    }

    #[test]
    fn test_delay_uses_calibrated_rate() {
        let clock = LoopClock {
            now: Cell::new(0),
            loops_per_tick: 4096,
        };
        let advance = |loops: u64| clock.now.set(clock.now.get() + loops);
        let delay = DelayLoop::new();
        assert_eq!(delay.loops_per_tick(), None);

        let loops = delay.calibrate(&clock, advance).unwrap();
        assert_eq!(delay.loops_per_tick(), Some(loops));

        let requested = Cell::new(0);
        delay.delay_ticks(&clock, 3, |n| requested.set(n));
        assert_eq!(requested.get(), loops * 3);
    }

    #[test]
    fn test_uncalibrated_delay_polls_clock() {
        let clock = LoopClock {
            now: Cell::new(0),
            loops_per_tick: 100,
        };
        let delay = DelayLoop::new();
        let start = clock.ticks();
        delay.delay_ticks(&clock, 2, |_| panic!("no calibrated rate yet"));
        assert!(clock.ticks() - start >= 2);
    }
}
