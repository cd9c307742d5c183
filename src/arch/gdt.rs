//! Segments and the TSS: kernel and ring-3 selectors, the double-fault stack, and the
//! ring-0 stack the CPU switches to on a trap from user mode.

use core::ptr::{addr_of, addr_of_mut};

use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

const STACK_SIZE: usize = 4096 * 5;

#[repr(align(16))]
struct Stack([u8; STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: Stack = Stack([0; STACK_SIZE]);
/// Ring-0 stack for traps from user mode until the scheduler installs a per-task one.
static mut PRIVILEGE_STACK: Stack = Stack([0; STACK_SIZE]);

static mut TSS: TaskStateSegment = TaskStateSegment::new();

fn stack_top(stack: *const Stack) -> VirtAddr {
    VirtAddr::from_ptr(stack) + STACK_SIZE as u64
}

pub struct Selectors {
    pub kernel_code: SegmentSelector,
    pub kernel_data: SegmentSelector,
    pub user_code: SegmentSelector,
    pub user_data: SegmentSelector,
    tss: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    // SAFETY: runs once, before the TSS is loaded.
    unsafe {
        let tss = &mut *addr_of_mut!(TSS);
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
            stack_top(addr_of!(DOUBLE_FAULT_STACK));
        tss.privilege_stack_table[0] = stack_top(addr_of!(PRIVILEGE_STACK));
    }

    let mut gdt = GlobalDescriptorTable::new();
    let kernel_code = gdt.append(Descriptor::kernel_code_segment());
    let kernel_data = gdt.append(Descriptor::kernel_data_segment());
    // Selectors carry the descriptor's DPL as RPL, so these come back as ring 3.
    let user_data = gdt.append(Descriptor::user_data_segment());
    let user_code = gdt.append(Descriptor::user_code_segment());
    // SAFETY: the TSS is a static and lives as long as the GDT.
    let tss = gdt.append(unsafe { Descriptor::tss_segment_unchecked(addr_of!(TSS)) });

    (
        gdt,
        Selectors {
            kernel_code,
            kernel_data,
            user_code,
            user_data,
            tss,
        },
    )
});

pub fn init() {
    let (ref gdt, ref selectors) = *GDT;
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.kernel_code);
        DS::set_reg(selectors.kernel_data);
        ES::set_reg(selectors.kernel_data);
        SS::set_reg(selectors.kernel_data);

        x86_64::instructions::tables::load_tss(selectors.tss);
    }
}

pub fn selectors() -> &'static Selectors {
    &GDT.1
}

/// Stack the CPU switches to on a trap from ring 3.
pub fn set_kernel_stack(top: VirtAddr) {
    // SAFETY: single core, called with interrupts disabled; the CPU only reads the field
    // on a privilege change.
    unsafe {
        (*addr_of_mut!(TSS)).privilege_stack_table[0] = top;
    }
}
