//! Ordered memory and address-space bootstrap.
//!
//! ```text
//! kernel_end ─▶ FirstFree ─▶ Frames ─▶ VirtualSpace ─▶ Heap ─▶ Mmio
//!                                                               │
//!             TlbFlush ◀─ IdentityTeardown ◀─ HighVectors ◀─────┘
//! ```
//!
//! Ownership of the free physical range moves from the boot thread to the frame allocator,
//! then to the virtual-space manager, then to the heap. The sequence runs exactly once:
//! [`MemoryBootstrap::run`] consumes the bootstrap object.

use core::fmt;
use core::ops::Range;

use super::{
    directory_index, FrameAllocator, KernelHeap, KernelMemory, MemoryError, Mmu, PhysAddr,
    VirtAddr, VirtualSpace, VmProt,
};
use crate::config::{
    page_roundup, HIGH_VECTORS_VA, IDENTITY_DIRECTORY_ENTRIES, KERNEL_HEAP_SIZE, MMIO_BASE_VA,
    MMIO_WINDOW_PAGES, PAGE_SIZE, VECTOR_PAGE_PA,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    FirstFree,
    Frames,
    VirtualSpace,
    Heap,
    Mmio,
    HighVectors,
    IdentityTeardown,
    TlbFlush,
}

impl BootStep {
    pub fn name(&self) -> &'static str {
        match self {
            BootStep::FirstFree => "first free address",
            BootStep::Frames => "frame allocator",
            BootStep::VirtualSpace => "virtual space",
            BootStep::Heap => "kernel heap",
            BootStep::Mmio => "MMIO window",
            BootStep::HighVectors => "high vectors",
            BootStep::IdentityTeardown => "identity teardown",
            BootStep::TlbFlush => "TLB flush",
        }
    }
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    Step { step: BootStep, source: MemoryError },
    /// The kernel's own mapping sits under a level-4 entry slated for teardown.
    KernelUnderIdentity { entry: usize },
    IdentityStillMapped { entry: usize },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Step { step, source } => write!(f, "{} failed: {}", step, source),
            BootError::KernelUnderIdentity { entry } => {
                write!(f, "kernel is mapped through identity entry {}", entry)
            }
            BootError::IdentityStillMapped { entry } => {
                write!(f, "identity entry {} still present after teardown", entry)
            }
        }
    }
}

fn at(step: BootStep) -> impl Fn(MemoryError) -> BootError {
    move |source| BootError::Step { step, source }
}

/// Addresses the sequence works with. Produced by the platform from the loader's handoff.
#[derive(Debug, Clone)]
pub struct BootLayout<'a> {
    /// End of everything the loader placed in memory for the kernel.
    pub kernel_end: PhysAddr,
    pub ram_end: PhysAddr,
    /// Physical holes between `kernel_end` and `ram_end` that must never be allocated.
    pub reserved: &'a [Range<u64>],
    pub heap_size: u64,
    pub mmio_base: VirtAddr,
    pub mmio_pages: usize,
    pub high_vectors: VirtAddr,
    pub vector_page: PhysAddr,
    pub identity_entries: Range<usize>,
    /// Single pages the loader mapped for its own use outside the identity entries.
    pub scratch_pages: &'a [VirtAddr],
    pub kernel_link_addr: VirtAddr,
}

impl<'a> BootLayout<'a> {
    /// Layout with the kernel-wide constants filled in.
    pub fn standard(
        kernel_end: PhysAddr,
        ram_end: PhysAddr,
        reserved: &'a [Range<u64>],
        kernel_link_addr: VirtAddr,
    ) -> Self {
        Self {
            kernel_end,
            ram_end,
            reserved,
            heap_size: KERNEL_HEAP_SIZE,
            mmio_base: VirtAddr::new(MMIO_BASE_VA),
            mmio_pages: MMIO_WINDOW_PAGES,
            high_vectors: VirtAddr::new(HIGH_VECTORS_VA),
            vector_page: PhysAddr::new(VECTOR_PAGE_PA),
            identity_entries: IDENTITY_DIRECTORY_ENTRIES,
            scratch_pages: &[],
            kernel_link_addr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReport {
    pub first_free: PhysAddr,
    pub frames_start: PhysAddr,
    pub heap_start: VirtAddr,
    pub heap_size: u64,
    pub free_frames: usize,
}

pub struct MemoryBootstrap<F, V, H> {
    frames: F,
    vm: V,
    heap: H,
}

impl<F, V, H> MemoryBootstrap<F, V, H>
where
    F: FrameAllocator,
    V: VirtualSpace + Mmu,
    H: KernelHeap,
{
    pub fn new(frames: F, vm: V, heap: H) -> Self {
        Self { frames, vm, heap }
    }

    pub fn run(self, layout: &BootLayout<'_>) -> Result<(KernelMemory<F, V>, MemoryReport), BootError> {
        let Self {
            mut frames,
            mut vm,
            mut heap,
        } = self;

        let first_free = PhysAddr::new(page_roundup(layout.kernel_end.as_u64()));
        log::debug!("mm: {} = {:#x}", BootStep::FirstFree, first_free.as_u64());

        let frames_start = frames
            .init(first_free, layout.ram_end)
            .map_err(at(BootStep::Frames))?;
        for hole in layout.reserved {
            frames.reserve(PhysAddr::new(hole.start), PhysAddr::new(hole.end));
        }
        frames.reserve(layout.vector_page, layout.vector_page + PAGE_SIZE);
        log::debug!("mm: {} from {:#x}", BootStep::Frames, frames_start.as_u64());

        let heap_phys = frames_start.as_u64()..frames_start.as_u64() + layout.heap_size;
        check_heap_range(&heap_phys, layout).map_err(at(BootStep::VirtualSpace))?;
        frames.reserve(PhysAddr::new(heap_phys.start), PhysAddr::new(heap_phys.end));
        vm.init(PhysAddr::new(heap_phys.end))
            .map_err(at(BootStep::VirtualSpace))?;
        log::debug!("mm: {} after {:#x}", BootStep::VirtualSpace, heap_phys.end);

        let heap_start = vm.phys_to_virt(frames_start);
        // SAFETY: the heap frames were withdrawn from the frame allocator above and the
        // physical window maps them writable.
        unsafe { heap.init(heap_start, layout.heap_size as usize) };
        log::debug!("mm: {} at {:#x}", BootStep::Heap, heap_start.as_u64());

        vm.page_alloc_in_addr(&mut frames, layout.mmio_base, layout.mmio_pages, VmProt::RW)
            .map_err(at(BootStep::Mmio))?;
        log::debug!("mm: {} at {:#x}", BootStep::Mmio, layout.mmio_base.as_u64());

        vm.page_map(&mut frames, layout.high_vectors, layout.vector_page, 1, VmProt::RW)
            .map_err(at(BootStep::HighVectors))?;
        vm.enable_high_vectors(layout.high_vectors)
            .map_err(at(BootStep::HighVectors))?;
        log::debug!("mm: {} at {:#x}", BootStep::HighVectors, layout.high_vectors.as_u64());

        teardown_identity(&mut vm, layout)?;
        log::debug!("mm: {} {:?}", BootStep::IdentityTeardown, layout.identity_entries);

        vm.flush_tlb();

        let report = MemoryReport {
            first_free,
            frames_start,
            heap_start,
            heap_size: layout.heap_size,
            free_frames: frames.free_frames(),
        };
        Ok((KernelMemory { frames, vm }, report))
    }
}

fn check_heap_range(heap: &Range<u64>, layout: &BootLayout<'_>) -> Result<(), MemoryError> {
    let invalid = MemoryError::InvalidRange {
        start: heap.start,
        end: heap.end,
    };
    if heap.end > layout.ram_end.as_u64() {
        return Err(MemoryError::OutOfFrames);
    }
    if layout
        .reserved
        .iter()
        .any(|hole| hole.start < heap.end && heap.start < hole.end)
    {
        return Err(invalid);
    }
    Ok(())
}

fn teardown_identity<M: Mmu>(mmu: &mut M, layout: &BootLayout<'_>) -> Result<(), BootError> {
    let kernel_entry = directory_index(layout.kernel_link_addr);
    if layout.identity_entries.contains(&kernel_entry) {
        return Err(BootError::KernelUnderIdentity { entry: kernel_entry });
    }

    for entry in layout.identity_entries.clone() {
        mmu.clear_directory_entry(entry);
    }
    for &page in layout.scratch_pages {
        mmu.clear_page_entry(page);
    }

    match layout
        .identity_entries
        .clone()
        .find(|&entry| mmu.directory_entry_present(entry))
    {
        Some(entry) => Err(BootError::IdentityStillMapped { entry }),
        None => Ok(()),
    }
}
