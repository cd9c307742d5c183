use core::fmt;

use spin::Mutex;

const MAX_COMPONENTS: usize = 16;

/// Kernel initialization status tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Kernel component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub status: InitStatus,
}

impl ComponentStatus {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            status: InitStatus::NotStarted,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, InitStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, InitStatus::Failed)
    }
}

/// Fixed-size component list; boot phases run before the heap exists.
pub struct BootProgress {
    components: [ComponentStatus; MAX_COMPONENTS],
    len: usize,
}

impl BootProgress {
    pub const fn new() -> Self {
        Self {
            components: [ComponentStatus::new(""); MAX_COMPONENTS],
            len: 0,
        }
    }

    /// Returns `false` when the table is full or `name` is already tracked.
    pub fn register(&mut self, name: &'static str) -> bool {
        if self.len == MAX_COMPONENTS || self.get(name).is_some() {
            return false;
        }
        self.components[self.len] = ComponentStatus::new(name);
        self.len += 1;
        true
    }

    pub fn update(&mut self, name: &'static str, status: InitStatus) {
        if let Some(comp) = self.components[..self.len].iter_mut().find(|c| c.name == name) {
            comp.status = status;
        }
    }

    pub fn get(&self, name: &str) -> Option<&ComponentStatus> {
        self.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentStatus> {
        self.components[..self.len].iter()
    }

    pub fn all_ready(&self) -> bool {
        self.len > 0 && self.iter().all(|c| c.is_complete())
    }
}

impl Default for BootProgress {
    fn default() -> Self {
        Self::new()
    }
}

static INIT_STATUS: Mutex<BootProgress> = Mutex::new(BootProgress::new());

/// Track kernel component initialization
pub fn register_component(name: &'static str) {
    if !INIT_STATUS.lock().register(name) {
        log::warn!("status: cannot track {}", name);
    }
}

/// Update component status
pub fn update_component_status(name: &'static str, status: InitStatus) {
    INIT_STATUS.lock().update(name, status);
}

pub fn component_status(name: &str) -> Option<InitStatus> {
    INIT_STATUS.lock().get(name).map(|c| c.status)
}

/// Check if all components are initialized
pub fn all_components_ready() -> bool {
    INIT_STATUS.lock().all_ready()
}

/// Logs one line per tracked component.
pub fn log_summary() {
    for comp in INIT_STATUS.lock().iter() {
        if comp.is_failed() {
            log::error!("  {:<20} {}", comp.name, comp.status);
        } else {
            log::info!("  {:<20} {}", comp.name, comp.status);
        }
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::NotStarted => write!(f, "Not Started"),
            InitStatus::InProgress => write!(f, "In Progress"),
            InitStatus::Completed => write!(f, "Completed"),
            InitStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let mut progress = BootProgress::new();
        assert!(!progress.all_ready());
        assert!(progress.register("Memory"));
        assert!(progress.register("Tasks"));
        assert!(!progress.register("Memory"));

        progress.update("Memory", InitStatus::Completed);
        assert!(!progress.all_ready());
        progress.update("Tasks", InitStatus::Completed);
        assert!(progress.all_ready());

        progress.update("Tasks", InitStatus::Failed);
        assert!(progress.get("Tasks").unwrap().is_failed());
        assert!(progress.get("Missing").is_none());
    }

    #[test]
    fn test_table_full() {
        const NAMES: [&str; MAX_COMPONENTS + 1] = [
            "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
        ];
        let mut progress = BootProgress::new();
        for &name in &NAMES[..MAX_COMPONENTS] {
            assert!(progress.register(name));
        }
        assert!(!progress.register(NAMES[MAX_COMPONENTS]));
        assert_eq!(progress.iter().count(), MAX_COMPONENTS);
    }
}
