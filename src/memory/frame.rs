//! Bitmap physical frame allocator.
//!
//! One bit per 4 KiB frame, set = in use. The bitmap occupies the first pages of the range
//! it manages and is reached through the physical memory window.

use core::slice;

use super::{FrameAllocator, MemoryError, PhysAddr};
use crate::config::{page_roundup, pages_for, PAGE_SIZE};

pub struct BitmapFrameAllocator {
    phys_offset: u64,
    bitmap: &'static mut [u8],
    base: u64,
    frames: usize,
    free: usize,
    hint: usize,
}

impl BitmapFrameAllocator {
    /// # Safety
    ///
    /// Physical memory handed to [`FrameAllocator::init`] must be writable at
    /// `phys + phys_offset` and unused.
    pub unsafe fn new(phys_offset: u64) -> Self {
        Self {
            phys_offset,
            bitmap: Default::default(),
            base: 0,
            frames: 0,
            free: 0,
            hint: 0,
        }
    }

    /// First managed frame, just past the bitmap.
    pub fn base(&self) -> PhysAddr {
        PhysAddr::new(self.base)
    }

    pub fn end(&self) -> PhysAddr {
        PhysAddr::new(self.base + self.frames as u64 * PAGE_SIZE)
    }

    fn index_of(&self, addr: u64) -> Option<usize> {
        if addr < self.base || addr % PAGE_SIZE != 0 {
            return None;
        }
        let index = ((addr - self.base) / PAGE_SIZE) as usize;
        (index < self.frames).then_some(index)
    }

    fn is_used(&self, index: usize) -> bool {
        self.bitmap[index / 8] & (1 << (index % 8)) != 0
    }

    fn set_used(&mut self, index: usize) {
        if !self.is_used(index) {
            self.bitmap[index / 8] |= 1 << (index % 8);
            self.free -= 1;
        }
    }

    fn set_free(&mut self, index: usize) {
        if self.is_used(index) {
            self.bitmap[index / 8] &= !(1 << (index % 8));
            self.free += 1;
        }
    }
}

impl FrameAllocator for BitmapFrameAllocator {
    fn init(&mut self, start: PhysAddr, end: PhysAddr) -> Result<PhysAddr, MemoryError> {
        let start_addr = page_roundup(start.as_u64());
        let end_addr = end.align_down(PAGE_SIZE).as_u64();
        let invalid = MemoryError::InvalidRange {
            start: start.as_u64(),
            end: end.as_u64(),
        };
        if end_addr <= start_addr {
            return Err(invalid);
        }

        let total = ((end_addr - start_addr) / PAGE_SIZE) as usize;
        let bitmap_pages = pages_for(total.div_ceil(8) as u64);
        if bitmap_pages >= total {
            return Err(invalid);
        }
        let frames = total - bitmap_pages;
        let bitmap_len = frames.div_ceil(8);

        // SAFETY: `new`'s contract makes the first `bitmap_pages` pages of the range ours
        // through the physical window.
        self.bitmap = unsafe {
            slice::from_raw_parts_mut(
                start_addr.wrapping_add(self.phys_offset) as *mut u8,
                bitmap_len,
            )
        };
        self.bitmap.fill(0);
        self.base = start_addr + bitmap_pages as u64 * PAGE_SIZE;
        self.frames = frames;
        self.free = frames;
        self.hint = 0;

        log::debug!(
            "frames: {} managed at {:#x}..{:#x}, bitmap {} page(s)",
            frames,
            self.base,
            end_addr,
            bitmap_pages
        );
        Ok(PhysAddr::new(self.base))
    }

    fn reserve(&mut self, start: PhysAddr, end: PhysAddr) {
        let start = start.align_down(PAGE_SIZE).as_u64().max(self.base);
        let end = page_roundup(end.as_u64()).min(self.end().as_u64());
        let mut addr = start;
        while addr < end {
            if let Some(index) = self.index_of(addr) {
                self.set_used(index);
            }
            addr += PAGE_SIZE;
        }
    }

    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        if self.free == 0 {
            return None;
        }
        let index = (self.hint..self.frames)
            .chain(0..self.hint)
            .find(|&i| !self.is_used(i))?;
        self.set_used(index);
        self.hint = (index + 1) % self.frames;
        Some(PhysAddr::new(self.base + index as u64 * PAGE_SIZE))
    }

    fn free_frame(&mut self, frame: PhysAddr) {
        match self.index_of(frame.as_u64()) {
            Some(index) if self.is_used(index) => self.set_free(index),
            Some(_) => log::warn!("frames: double free of {:#x}", frame.as_u64()),
            None => log::warn!("frames: {:#x} is not managed here", frame.as_u64()),
        }
    }

    fn free_frames(&self) -> usize {
        self.free
    }
}

// SAFETY: the bitmap is only reached through `&mut self`.
unsafe impl Send for BitmapFrameAllocator {}
