//! Kernel-wide configuration: address-space layout, sizes and hardware numbers.
//!
//! ```text
//! Virtual memory layout
//!
//! 0xffff_ffff_ffff_0000 - 0xffff_ffff_ffff_1000 = High vectors (relocated IDT)
//! 0xffff_c000_0000_0000 - 0xffff_c000_0100_0000 = Memory-mapped I/O window
//! 0xffff_8100_0000_0000 - 0xffff_c000_0000_0000 = Loader dynamic range (kernel, stack, boot info)
//! 0xffff_8000_0000_0000 - ...                   = Physical memory window (heap lives here)
//! 0x0000_0000_3ff0_0000 - 0x0000_0000_4000_0000 = First user task stack/heap (1 MiB)
//! 0x0000_0000_0804_8000 - 0x0000_0000_0804_9000 = First user task code
//! 0x0000_0000_0000_0000 - 0x0000_0080_0000_0000 = Loader identity map (torn down at boot)
//! ```

use log::LevelFilter;

use crate::devices::drivers::ps2_keyboard::ReleasePolicy;

pub const PAGE_SIZE: u64 = 4096;

/// Base of the loader's physical memory window.
pub const PHYS_MEM_OFFSET: u64 = 0xffff_8000_0000_0000;
/// Loader places its dynamic mappings inside this range.
pub const DYNAMIC_RANGE_START: u64 = 0xffff_8100_0000_0000;
pub const DYNAMIC_RANGE_END: u64 = 0xffff_c000_0000_0000;

pub const KERNEL_HEAP_SIZE: u64 = 1024 * PAGE_SIZE;

pub const MMIO_BASE_VA: u64 = 0xffff_c000_0000_0000;
pub const MMIO_WINDOW_PAGES: usize = 4096;

pub const HIGH_VECTORS_VA: u64 = 0xffff_ffff_ffff_0000;
pub const VECTOR_PAGE_PA: u64 = 0x0;

/// Level-4 entries that only exist for the loader's identity map.
pub const IDENTITY_DIRECTORY_ENTRIES: core::ops::Range<usize> = 0..1;

pub const USER_ENTRY_VA: u64 = 0x0804_8000;
pub const USER_MAX_ADDR: u64 = 0x4000_0000;
pub const USER_STACK_SIZE: u64 = 1024 * 1024;
pub const USER_TASK_ARG: u64 = 0x1234_5678;

pub const NR_IRQ: usize = 16;
pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KEYBOARD: u8 = 1;

pub const PORT_KBD_STATUS: u16 = 0x64;
pub const PORT_KBD_DATA: u16 = 0x60;
pub const KBD_STATUS_READY: u8 = 0x01;

pub const COM1_PORT: u16 = 0x3f8;

/// Runtime knobs chosen at build time.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub log_level: LevelFilter,
    pub release_policy: ReleasePolicy,
}

impl KernelConfig {
    pub const fn default_config() -> Self {
        Self {
            log_level: if cfg!(debug_assertions) {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
            release_policy: ReleasePolicy::Forward,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

pub const fn page_roundup(addr: u64) -> u64 {
    (addr + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

pub const fn pages_for(bytes: u64) -> usize {
    (page_roundup(bytes) / PAGE_SIZE) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_roundup() {
        assert_eq!(page_roundup(0), 0);
        assert_eq!(page_roundup(1), PAGE_SIZE);
        assert_eq!(page_roundup(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(page_roundup(0x10_0001), 0x10_1000);
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(KERNEL_HEAP_SIZE, 4 * 1024 * 1024);
        assert_eq!(pages_for(USER_STACK_SIZE), 256);
        assert!(USER_ENTRY_VA + PAGE_SIZE <= USER_MAX_ADDR - USER_STACK_SIZE);
        assert!(MMIO_BASE_VA >= DYNAMIC_RANGE_END);
        assert!(MMIO_BASE_VA + MMIO_WINDOW_PAGES as u64 * PAGE_SIZE <= HIGH_VECTORS_VA);
    }
}
