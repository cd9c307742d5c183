//! Device Drivers
//!
//! This module contains drivers for the hardware the kernel talks to:
//! - PS/2 Keyboard (IRQ1)

pub mod ps2_keyboard;

pub use ps2_keyboard::{IrqOutcome, Keyboard, KeyboardPorts, ReleasePolicy};
