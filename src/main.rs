#![no_std]
#![no_main]

extern crate rlibc;

use core::ops::Range;
use core::panic::PanicInfo;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::info::{MemoryRegionKind, MemoryRegions};
use bootloader_api::{entry_point, BootInfo};
use x86_64::instructions::interrupts;
use x86_64::{PhysAddr, VirtAddr};

use halcyon::arch::heap::{self, GlobalHeap};
use halcyon::arch::paging::PagingSpace;
use halcyon::arch::sched::Scheduler;
use halcyon::arch::user_program::FIRST_USER_PROGRAM;
use halcyon::arch::{self, pic, serial, HaltSuspend, Pc, KERNEL};
use halcyon::config::{
    KernelConfig, DYNAMIC_RANGE_END, DYNAMIC_RANGE_START, PHYS_MEM_OFFSET,
};
use halcyon::kernel::{
    init_phase, register_boot_phases, status, update_component_status, InitStatus,
};
use halcyon::memory::{
    BitmapFrameAllocator, BootError, BootLayout, KernelMemory, MemoryBootstrap,
};
use halcyon::task::{start_user_task, TaskSubsystem};
use halcyon::{println, Kernel};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::FixedAddress(PHYS_MEM_OFFSET));
    config.mappings.dynamic_range_start = Some(DYNAMIC_RANGE_START);
    config.mappings.dynamic_range_end = Some(DYNAMIC_RANGE_END);
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

const MAX_HOLES: usize = 64;

pub fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    let config = KernelConfig::default();
    register_boot_phases();

    if serial::init(config.log_level).is_err() {
        println!("logger already installed");
        arch::halt_loop();
    }
    update_component_status("Serial Console", InitStatus::Completed);
    println!("╔════════════════════════════════════════╗");
    println!("║          Halcyon kernel booting        ║");
    println!("╚════════════════════════════════════════╝");

    if init_phase("Descriptor Tables", arch::init_cpu).is_err()
        || init_phase("Interrupt Controller", pic::init).is_err()
    {
        arch::halt_loop();
    }

    let kernel = match init_phase("Kernel Context", || {
        Kernel::new(Pc::new(), HaltSuspend, &config).map(|kernel| KERNEL.call_once(|| kernel))
    }) {
        Ok(kernel) => kernel,
        Err(_) => arch::halt_loop(),
    };

    let mut memory = match init_phase("Memory Management", || boot_memory(boot_info)) {
        Ok(memory) => memory,
        Err(_) => arch::halt_loop(),
    };

    let _ = init_phase("Interrupt System", || {
        kernel.enable_irqs();
        interrupts::enable();
        Ok::<(), &str>(())
    });

    let tasks = Scheduler;
    if init_phase("Task Subsystem", || {
        tasks.init()?;
        tasks.run_as_task0()
    })
    .is_err()
    {
        arch::halt_loop();
    }

    if let Err(e) = kernel.calibrate_delay() {
        log::warn!("delay calibration skipped: {}", e);
    }

    // A missing first task leaves an idle kernel, not a dead one.
    let _ = init_phase("First User Task", || {
        start_user_task(&mut memory, &tasks, &FIRST_USER_PROGRAM)
    });

    status::log_summary();
    if !status::all_components_ready() {
        log::warn!("boot finished with components not ready");
    }
    log::info!("heap: {} KiB free", heap::free_bytes() / 1024);

    loop {
        tasks.yield_now();
        interrupts::enable_and_hlt();
    }
}

fn boot_memory(
    boot_info: &BootInfo,
) -> Result<KernelMemory<BitmapFrameAllocator, PagingSpace>, BootError> {
    let phys_offset = boot_info
        .physical_memory_offset
        .into_option()
        .unwrap_or(PHYS_MEM_OFFSET);
    let regions: &MemoryRegions = &boot_info.memory_regions;

    let loader_end = regions
        .iter()
        .filter(|r| r.kind == MemoryRegionKind::Bootloader)
        .map(|r| r.end)
        .max()
        .unwrap_or(0);
    let kernel_end = loader_end.max(boot_info.kernel_addr + boot_info.kernel_len);
    let ram_end = regions
        .iter()
        .filter(|r| r.kind == MemoryRegionKind::Usable)
        .map(|r| r.end)
        .max()
        .unwrap_or(0);

    let mut holes: [Range<u64>; MAX_HOLES] = core::array::from_fn(|_| 0..0);
    let mut count = 0;
    let above_kernel = regions
        .iter()
        .filter(|r| r.kind != MemoryRegionKind::Usable && r.end > kernel_end);
    for region in above_kernel {
        if count < MAX_HOLES {
            holes[count] = region.start..region.end;
            count += 1;
        } else {
            // Out of slots: widen the last one to cover this region too.
            let last = &mut holes[MAX_HOLES - 1];
            *last = last.start.min(region.start)..last.end.max(region.end);
        }
    }

    let layout = BootLayout::standard(
        PhysAddr::new(kernel_end),
        PhysAddr::new(ram_end),
        &holes[..count],
        VirtAddr::new(kernel_main as usize as u64),
    );
    log::info!(
        "mm: kernel ends at {:#x}, RAM ends at {:#x}, {} reserved region(s)",
        kernel_end,
        ram_end,
        count
    );

    // SAFETY: the loader maps all physical memory at `phys_offset`, the range handed to the
    // frame allocator starts past everything it placed, and nothing else holds the level-4
    // table.
    let (frames, vm) = unsafe {
        (
            BitmapFrameAllocator::new(phys_offset),
            PagingSpace::new(VirtAddr::new(phys_offset)),
        )
    };
    let (memory, report) = MemoryBootstrap::new(frames, vm, GlobalHeap).run(&layout)?;
    log::info!(
        "mm: {} free frames from {:#x}, heap {:#x}+{:#x}",
        report.free_frames,
        report.frames_start.as_u64(),
        report.heap_start.as_u64(),
        report.heap_size
    );
    Ok(memory)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!("PANIC : {}", info);
    arch::halt_loop()
}
