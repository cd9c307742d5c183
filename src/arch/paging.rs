//! Kernel address space on the live level-4 table.

use x86_64::registers::control::Cr3;
use x86_64::structures::paging::mapper::{MapToError, Translate, UnmapError};
use x86_64::structures::paging::{
    FrameAllocator as PageTableFrames, Mapper, OffsetPageTable, Page, PageTable,
    PageTableFlags, PhysFrame, Size4KiB,
};
use x86_64::{PhysAddr, VirtAddr};

use crate::config::PAGE_SIZE;
use crate::memory::{FrameAllocator, MemoryError, Mmu, VirtualSpace, VmProt};

/// Hands frames for intermediate page tables to the `x86_64` mapper.
struct TableFrames<'a, F>(&'a mut F);

unsafe impl<F: FrameAllocator> PageTableFrames<Size4KiB> for TableFrames<'_, F> {
    fn allocate_frame(&mut self) -> Option<PhysFrame<Size4KiB>> {
        self.0.alloc_frame().map(PhysFrame::containing_address)
    }
}

fn leaf_flags(prot: VmProt) -> PageTableFlags {
    let mut flags = PageTableFlags::PRESENT;
    if prot.contains(VmProt::WRITE) {
        flags |= PageTableFlags::WRITABLE;
    }
    if prot.contains(VmProt::USER) {
        flags |= PageTableFlags::USER_ACCESSIBLE;
    }
    if !prot.contains(VmProt::EXEC) {
        flags |= PageTableFlags::NO_EXECUTE;
    }
    flags
}

fn table_flags(prot: VmProt) -> PageTableFlags {
    let mut flags = PageTableFlags::PRESENT | PageTableFlags::WRITABLE;
    if prot.contains(VmProt::USER) {
        flags |= PageTableFlags::USER_ACCESSIBLE;
    }
    flags
}

fn map_error(va: VirtAddr, err: MapToError<Size4KiB>) -> MemoryError {
    match err {
        MapToError::FrameAllocationFailed => MemoryError::OutOfFrames,
        MapToError::PageAlreadyMapped(_) => MemoryError::AlreadyMapped(va.as_u64()),
        MapToError::ParentEntryHugePage => MemoryError::PageTable(va.as_u64()),
    }
}

pub struct PagingSpace {
    mapper: OffsetPageTable<'static>,
    phys_offset: VirtAddr,
}

impl PagingSpace {
    /// # Safety
    ///
    /// All physical memory must be mapped at `phys_offset`, and nothing else may hold a
    /// reference to the active level-4 table.
    pub unsafe fn new(phys_offset: VirtAddr) -> Self {
        let (level_4_frame, _) = Cr3::read();
        let virt = phys_offset + level_4_frame.start_address().as_u64();
        let level_4: &'static mut PageTable = &mut *virt.as_mut_ptr::<PageTable>();
        Self {
            mapper: OffsetPageTable::new(level_4, phys_offset),
            phys_offset,
        }
    }

    fn zero_frame(&self, frame: PhysAddr) {
        let ptr = self.phys_to_virt(frame).as_mut_ptr::<u8>();
        // SAFETY: freshly allocated frame, reached through the physical window.
        unsafe { core::ptr::write_bytes(ptr, 0, PAGE_SIZE as usize) };
    }

    fn map_one<F: FrameAllocator>(
        &mut self,
        frames: &mut F,
        page: Page<Size4KiB>,
        frame: PhysAddr,
        prot: VmProt,
    ) -> Result<(), MemoryError> {
        let va = page.start_address();
        // SAFETY: the caller picked a frame that is not mapped anywhere else in a way the
        // new flags would conflict with.
        unsafe {
            self.mapper
                .map_to_with_table_flags(
                    page,
                    PhysFrame::containing_address(frame),
                    leaf_flags(prot),
                    table_flags(prot),
                    &mut TableFrames(frames),
                )
                .map_err(|e| map_error(va, e))?
                .flush();
        }
        Ok(())
    }
}

impl VirtualSpace for PagingSpace {
    fn init(&mut self, next_free: PhysAddr) -> Result<PhysAddr, MemoryError> {
        // The live tables already exist; nothing past the heap window is claimed.
        Ok(next_free)
    }

    fn page_alloc_in_addr<F: FrameAllocator>(
        &mut self,
        frames: &mut F,
        va: VirtAddr,
        pages: usize,
        prot: VmProt,
    ) -> Result<(), MemoryError> {
        let first = Page::<Size4KiB>::containing_address(va);
        for i in 0..pages as u64 {
            let frame = frames.alloc_frame().ok_or(MemoryError::OutOfFrames)?;
            self.zero_frame(frame);
            if let Err(err) = self.map_one(frames, first + i, frame, prot) {
                frames.free_frame(frame);
                return Err(err);
            }
        }
        Ok(())
    }

    fn page_map<F: FrameAllocator>(
        &mut self,
        frames: &mut F,
        va: VirtAddr,
        pa: PhysAddr,
        pages: usize,
        prot: VmProt,
    ) -> Result<(), MemoryError> {
        let first = Page::<Size4KiB>::containing_address(va);
        for i in 0..pages as u64 {
            let page = first + i;
            match self.mapper.unmap(page) {
                Ok((_, flush)) => flush.flush(),
                Err(UnmapError::PageNotMapped) => {}
                Err(_) => return Err(MemoryError::PageTable(page.start_address().as_u64())),
            }
            self.map_one(frames, page, pa + i * PAGE_SIZE, prot)?;
        }
        Ok(())
    }

    fn copy_to(&mut self, va: VirtAddr, bytes: &[u8]) -> Result<(), MemoryError> {
        let mut done = 0;
        while done < bytes.len() {
            let addr = va + done as u64;
            let pa = self
                .mapper
                .translate_addr(addr)
                .ok_or(MemoryError::NotMapped(addr.as_u64()))?;
            let in_page = (PAGE_SIZE - addr.as_u64() % PAGE_SIZE) as usize;
            let len = in_page.min(bytes.len() - done);
            // SAFETY: `pa` backs a mapped page and is reached through the physical window;
            // `len` stays inside that page.
            unsafe {
                core::ptr::copy_nonoverlapping(
                    bytes[done..].as_ptr(),
                    self.phys_to_virt(pa).as_mut_ptr::<u8>(),
                    len,
                );
            }
            done += len;
        }
        Ok(())
    }

    fn phys_to_virt(&self, pa: PhysAddr) -> VirtAddr {
        self.phys_offset + pa.as_u64()
    }
}

impl Mmu for PagingSpace {
    fn enable_high_vectors(&mut self, va: VirtAddr) -> Result<(), MemoryError> {
        if self.mapper.translate_addr(va).is_none() {
            return Err(MemoryError::NotMapped(va.as_u64()));
        }
        // SAFETY: the page was just mapped for this purpose and is never handed out.
        unsafe { super::idt::relocate(va) };
        Ok(())
    }

    fn directory_entry_present(&self, index: usize) -> bool {
        self.mapper.level_4_table()[index]
            .flags()
            .contains(PageTableFlags::PRESENT)
    }

    fn clear_directory_entry(&mut self, index: usize) {
        self.mapper.level_4_table_mut()[index].set_unused();
    }

    fn clear_page_entry(&mut self, va: VirtAddr) {
        if let Ok((_, flush)) = self.mapper.unmap(Page::<Size4KiB>::containing_address(va)) {
            flush.flush();
        }
    }

    fn flush_tlb(&mut self) {
        x86_64::instructions::tlb::flush_all();
    }
}
