//! Physical and virtual memory.
//!
//! The boot path only talks to memory through the collaborator traits below; the x86_64
//! implementations live in `arch::x86_64`, the bitmap frame allocator in [`frame`].
//! [`bootstrap`] runs them in the one order that works.

use core::fmt;

use bitflags::bitflags;

pub use x86_64::{PhysAddr, VirtAddr};

use crate::config::PAGE_SIZE;
use crate::task::UserMemory;

pub mod bootstrap;
pub mod frame;

pub use bootstrap::{BootError, BootLayout, BootStep, MemoryBootstrap, MemoryReport};
pub use frame::BitmapFrameAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    OutOfFrames,
    InvalidRange { start: u64, end: u64 },
    AlreadyMapped(u64),
    NotMapped(u64),
    /// An intermediate page table could not be allocated or is a huge page.
    PageTable(u64),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfFrames => write!(f, "out of physical frames"),
            MemoryError::InvalidRange { start, end } => {
                write!(f, "invalid range {:#x}..{:#x}", start, end)
            }
            MemoryError::AlreadyMapped(va) => write!(f, "{:#x} already mapped", va),
            MemoryError::NotMapped(va) => write!(f, "{:#x} not mapped", va),
            MemoryError::PageTable(va) => write!(f, "page table walk failed at {:#x}", va),
        }
    }
}

bitflags! {
    /// Access rights for a virtual mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VmProt: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXEC = 1 << 2;
        const USER = 1 << 3;
        const RW = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Physical page frames.
pub trait FrameAllocator {
    /// Takes over `[start, end)`. Returns the first free address past the allocator's own
    /// bookkeeping, which is placed at `start`.
    fn init(&mut self, start: PhysAddr, end: PhysAddr) -> Result<PhysAddr, MemoryError>;

    /// Withdraws `[start, end)` from allocation. Parts outside the managed range are ignored.
    fn reserve(&mut self, start: PhysAddr, end: PhysAddr);

    fn alloc_frame(&mut self) -> Option<PhysAddr>;

    fn free_frame(&mut self, frame: PhysAddr);

    fn free_frames(&self) -> usize;
}

/// Kernel virtual address space manager.
pub trait VirtualSpace {
    /// Starts managing the address space with `next_free` as the first address it may hand
    /// out. Returns the next free physical address.
    fn init(&mut self, next_free: PhysAddr) -> Result<PhysAddr, MemoryError>;

    /// Maps `pages` fresh zeroed frames at `va`.
    fn page_alloc_in_addr<F: FrameAllocator>(
        &mut self,
        frames: &mut F,
        va: VirtAddr,
        pages: usize,
        prot: VmProt,
    ) -> Result<(), MemoryError>;

    /// Maps `pages` pages at `va` onto the physical range starting at `pa`, replacing any
    /// existing mapping.
    fn page_map<F: FrameAllocator>(
        &mut self,
        frames: &mut F,
        va: VirtAddr,
        pa: PhysAddr,
        pages: usize,
        prot: VmProt,
    ) -> Result<(), MemoryError>;

    /// Copies `bytes` to the mapped range starting at `va`.
    fn copy_to(&mut self, va: VirtAddr, bytes: &[u8]) -> Result<(), MemoryError>;

    fn phys_to_virt(&self, pa: PhysAddr) -> VirtAddr;
}

/// Raw translation-table and processor control.
pub trait Mmu {
    /// Moves the exception vector base to `va`, which is already mapped.
    fn enable_high_vectors(&mut self, va: VirtAddr) -> Result<(), MemoryError>;

    fn directory_entry_present(&self, index: usize) -> bool;

    fn clear_directory_entry(&mut self, index: usize);

    /// Clears a single leaf mapping; a missing mapping is not an error.
    fn clear_page_entry(&mut self, va: VirtAddr);

    fn flush_tlb(&mut self);
}

pub trait KernelHeap {
    /// # Safety
    ///
    /// `[start, start + size)` must be mapped, writable and used by nothing else for the
    /// rest of the kernel's life.
    unsafe fn init(&mut self, start: VirtAddr, size: usize);
}

/// Level-4 slot covering `va`.
pub fn directory_index(va: VirtAddr) -> usize {
    usize::from(va.p4_index())
}

/// The initialized memory managers, handed back by the bootstrap sequence.
pub struct KernelMemory<F, V> {
    pub frames: F,
    pub vm: V,
}

impl<F: FrameAllocator, V: VirtualSpace> UserMemory for KernelMemory<F, V> {
    fn alloc_pages(&mut self, va: u64, pages: usize, prot: VmProt) -> Result<(), MemoryError> {
        let va = VirtAddr::try_new(va).map_err(|_| MemoryError::InvalidRange {
            start: va,
            end: va + pages as u64 * PAGE_SIZE,
        })?;
        self.vm.page_alloc_in_addr(&mut self.frames, va, pages, prot)
    }

    fn copy_to(&mut self, va: u64, bytes: &[u8]) -> Result<(), MemoryError> {
        let va = VirtAddr::try_new(va).map_err(|_| MemoryError::NotMapped(va))?;
        self.vm.copy_to(va, bytes)
    }
}
