//! Shift/Ctrl/Alt and lock-key state.

const LEFT_SHIFT: u8 = 0x2A;
const RIGHT_SHIFT: u8 = 0x36;
const CTRL: u8 = 0x1D;
const ALT: u8 = 0x38;
const CAPS_LOCK: u8 = 0x3A;
const SCROLL_LOCK: u8 = 0x46;
const NUM_LOCK: u8 = 0x45;
const INSERT: u8 = 0x52;

const LEFT_SHIFT_UP: u8 = LEFT_SHIFT | 0x80;
const RIGHT_SHIFT_UP: u8 = RIGHT_SHIFT | 0x80;
const CTRL_UP: u8 = CTRL | 0x80;
const ALT_UP: u8 = ALT | 0x80;
const CAPS_LOCK_UP: u8 = CAPS_LOCK | 0x80;
const SCROLL_LOCK_UP: u8 = SCROLL_LOCK | 0x80;
const NUM_LOCK_UP: u8 = NUM_LOCK | 0x80;
const INSERT_UP: u8 = INSERT | 0x80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub insert: bool,
    pub left_shift: bool,
    pub right_shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub caps_lock: bool,
    pub scroll_lock: bool,
    pub num_lock: bool,
}

impl ModifierState {
    pub const fn new() -> Self {
        Self {
            insert: false,
            left_shift: false,
            right_shift: false,
            alt: false,
            ctrl: false,
            caps_lock: false,
            scroll_lock: false,
            num_lock: false,
        }
    }

    /// Either shift key held.
    pub fn shift(&self) -> bool {
        self.left_shift || self.right_shift
    }

    /// Applies `scan` if it is a modifier or lock key.
    ///
    /// Returns `true` when the code was consumed as a state change and must not be
    /// translated. Held modifiers follow make/break; lock keys toggle on make and
    /// ignore their break code.
    pub fn apply_if_modifier(&mut self, scan: u8) -> bool {
        match scan {
            RIGHT_SHIFT => self.right_shift = true,
            RIGHT_SHIFT_UP => self.right_shift = false,

            LEFT_SHIFT => self.left_shift = true,
            LEFT_SHIFT_UP => self.left_shift = false,

            ALT => self.alt = true,
            ALT_UP => self.alt = false,

            CTRL => self.ctrl = true,
            CTRL_UP => self.ctrl = false,

            CAPS_LOCK => self.caps_lock = !self.caps_lock,
            CAPS_LOCK_UP => {}

            SCROLL_LOCK => self.scroll_lock = !self.scroll_lock,
            SCROLL_LOCK_UP => {}

            NUM_LOCK => self.num_lock = !self.num_lock,
            NUM_LOCK_UP => {}

            INSERT => self.insert = !self.insert,
            INSERT_UP => {}

            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKS: [u8; 4] = [CAPS_LOCK, SCROLL_LOCK, NUM_LOCK, INSERT];

    #[test]
    fn test_held_modifiers_follow_make_and_break() {
        let mut state = ModifierState::new();
        for (make, flag) in [
            (LEFT_SHIFT, (|s: &ModifierState| s.left_shift) as fn(&ModifierState) -> bool),
            (RIGHT_SHIFT, |s| s.right_shift),
            (CTRL, |s| s.ctrl),
            (ALT, |s| s.alt),
        ] {
            assert!(state.apply_if_modifier(make));
            assert!(flag(&state));
            assert!(state.apply_if_modifier(make | 0x80));
            assert!(!flag(&state));
        }
        assert_eq!(state, ModifierState::default());
    }

    #[test]
    fn test_lock_make_twice_restores() {
        for key in LOCKS {
            let mut state = ModifierState::new();
            assert!(state.apply_if_modifier(key));
            assert_ne!(state, ModifierState::default());
            assert!(state.apply_if_modifier(key));
            assert_eq!(state, ModifierState::default());
        }
    }

    #[test]
    fn test_lock_break_is_consumed_without_effect() {
        for key in LOCKS {
            let mut state = ModifierState::new();
            assert!(state.apply_if_modifier(key | 0x80));
            assert_eq!(state, ModifierState::default());

            state.apply_if_modifier(key);
            let toggled = state;
            assert!(state.apply_if_modifier(key | 0x80));
            assert_eq!(state, toggled);
        }
    }

    #[test]
    fn test_caps_lock_toggles_only_caps() {
        let mut state = ModifierState::new();
        state.apply_if_modifier(CAPS_LOCK);
        assert_eq!(state, ModifierState { caps_lock: true, ..ModifierState::default() });
    }

    #[test]
    fn test_other_codes_not_consumed() {
        let mut state = ModifierState::new();
        for scan in [0x1E, 0x9E, 0x01, 0x47, 0xE0, 0x00] {
            assert!(!state.apply_if_modifier(scan), "scan {:#x}", scan);
        }
        assert_eq!(state, ModifierState::default());
    }

    #[test]
    fn test_shift_either_side() {
        let mut state = ModifierState::new();
        assert!(!state.shift());
        state.apply_if_modifier(RIGHT_SHIFT);
        assert!(state.shift());
        state.apply_if_modifier(LEFT_SHIFT);
        state.apply_if_modifier(RIGHT_SHIFT | 0x80);
        assert!(state.shift());
    }
}
