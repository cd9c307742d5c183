//! Device Subsystem
//!
//! Hardware device drivers:
//! - `drivers`: PS/2 keyboard driver

pub mod drivers;
