//! Global allocator backed by the heap window the bootstrap sequence hands over.

use linked_list_allocator::LockedHeap;
use x86_64::VirtAddr;

use crate::memory::KernelHeap;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

pub struct GlobalHeap;

impl KernelHeap for GlobalHeap {
    unsafe fn init(&mut self, start: VirtAddr, size: usize) {
        ALLOCATOR.lock().init(start.as_mut_ptr::<u8>(), size);
    }
}

pub fn free_bytes() -> usize {
    ALLOCATOR.lock().free()
}
