//! COM1 console and the `log` backend.

use core::fmt::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;
use uart_16550::SerialPort;
use x86_64::instructions::interrupts;

use crate::config::COM1_PORT;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_PORT) });

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        x86_64::instructions::interrupts::without_interrupts(|| {
            let mut serial = $crate::arch::serial::SERIAL.lock();
            let _ = writeln!(serial, $($arg)*);
        });
    }};
}

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // IRQ handlers log too; the port lock must never be held across one.
        interrupts::without_interrupts(|| {
            let mut serial = SERIAL.lock();
            let _ = writeln!(
                serial,
                "[{:>5}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        });
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    SERIAL.lock().init();
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
