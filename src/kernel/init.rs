/// Kernel initialization phases
use core::fmt;

use crate::kernel::status::{register_component, update_component_status, InitStatus};

/// Boot phases in the order `kernel_main` runs them.
pub const BOOT_PHASES: [&str; 8] = [
    "Serial Console",
    "Descriptor Tables",
    "Interrupt Controller",
    "Kernel Context",
    "Memory Management",
    "Interrupt System",
    "Task Subsystem",
    "First User Task",
];

pub fn register_boot_phases() {
    for name in BOOT_PHASES {
        register_component(name);
    }
}

/// Runs one boot phase, tracking and logging its outcome.
pub fn init_phase<T, E, F>(name: &'static str, init_fn: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    update_component_status(name, InitStatus::InProgress);
    log::info!("Initializing {}...", name);

    match init_fn() {
        Ok(value) => {
            update_component_status(name, InitStatus::Completed);
            log::info!("    {} initialized", name);
            Ok(value)
        }
        Err(e) => {
            update_component_status(name, InitStatus::Failed);
            log::error!("    {} failed: {}", name, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::status::component_status;

    #[test]
    fn test_init_phase_tracks_outcome() {
        register_component("test phase ok");
        register_component("test phase err");

        assert_eq!(init_phase("test phase ok", || Ok::<_, &str>(7)), Ok(7));
        assert_eq!(component_status("test phase ok"), Some(InitStatus::Completed));

        assert_eq!(init_phase("test phase err", || Err::<(), _>("no memory")), Err("no memory"));
        assert_eq!(component_status("test phase err"), Some(InitStatus::Failed));
    }
}
