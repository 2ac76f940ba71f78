//! Bindings Module
//!
//! Action tags, the xkbcommon keysym constants the default keymap needs,
//! and the default binding table registered on every seat.

use crate::protocol::types::Modifiers;

/// Keysym values from xkbcommon-keysyms.h, limited to what the default
/// bindings use.
pub mod keysym {
    pub const RETURN: u32 = 0xff0d;
    pub const SPACE: u32 = 0x20;
    pub const TAB: u32 = 0xff09;
    pub const UP: u32 = 0xff52;
    pub const DOWN: u32 = 0xff54;

    pub const D: u32 = 0x64;
    pub const F: u32 = 0x66;
    pub const J: u32 = 0x6a;
    pub const K: u32 = 0x6b;
    pub const Q: u32 = 0x71;

    /// Keysyms for the digits 1..=9.
    pub const DIGITS: [u32; 9] = [0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39];
}

/// Linux evdev button codes used by the pointer bindings.
pub mod button {
    pub const LEFT: u32 = 0x110;
    pub const RIGHT: u32 = 0x111;
}

/// Everything a key or pointer binding (or an IPC command) can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SpawnTerminal,
    SpawnLauncher,
    CloseWindow,
    Quit,
    FocusNext,
    FocusPrev,
    SwapNext,
    SwapPrev,
    PromoteMaster,
    CycleLayoutNext,
    CycleLayoutPrev,
    ToggleFullscreen,
    /// 1-based workspace index.
    SwitchWorkspace(u8),
    MoveToWorkspace(u8),
    /// Pointer gesture starts; never bound to keys.
    StartMove,
    StartResize,
}

/// The default keymap, parameterized on the configured modifier. Later
/// entries for the same (modifiers, keysym) pair replace earlier ones at
/// registration time.
pub fn default_keymap(modifier: Modifiers) -> Vec<(Modifiers, u32, Action)> {
    let shifted = modifier | Modifiers::SHIFT;
    let mut map = vec![
        (shifted, keysym::Q, Action::Quit),
        (modifier, keysym::Q, Action::CloseWindow),
        (modifier, keysym::RETURN, Action::SpawnTerminal),
        (modifier, keysym::D, Action::SpawnLauncher),
        (modifier, keysym::J, Action::FocusNext),
        (modifier, keysym::K, Action::FocusPrev),
        (modifier, keysym::DOWN, Action::FocusNext),
        (modifier, keysym::UP, Action::FocusPrev),
        (shifted, keysym::J, Action::SwapNext),
        (shifted, keysym::K, Action::SwapPrev),
        (shifted, keysym::RETURN, Action::PromoteMaster),
        (modifier, keysym::SPACE, Action::CycleLayoutNext),
        (shifted, keysym::SPACE, Action::CycleLayoutPrev),
        (modifier, keysym::F, Action::ToggleFullscreen),
        (modifier, keysym::TAB, Action::FocusNext),
        (shifted, keysym::TAB, Action::FocusPrev),
    ];
    for (i, &sym) in keysym::DIGITS.iter().enumerate() {
        let ws = (i + 1) as u8;
        map.push((modifier, sym, Action::SwitchWorkspace(ws)));
        map.push((shifted, sym, Action::MoveToWorkspace(ws)));
    }
    map
}

/// The default pointer gestures: modifier + left drag moves, modifier +
/// right drag resizes.
pub fn default_pointer_map(modifier: Modifiers) -> Vec<(Modifiers, u32, Action)> {
    vec![
        (modifier, button::LEFT, Action::StartMove),
        (modifier, button::RIGHT, Action::StartResize),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keymap_covers_all_eighteen_workspace_actions() {
        let map = default_keymap(Modifiers::SUPER);
        let switches = map
            .iter()
            .filter(|(_, _, a)| matches!(a, Action::SwitchWorkspace(_)))
            .count();
        let moves = map
            .iter()
            .filter(|(_, _, a)| matches!(a, Action::MoveToWorkspace(_)))
            .count();
        assert_eq!((switches, moves), (9, 9));
    }

    #[test]
    fn quit_requires_the_shifted_chord() {
        let map = default_keymap(Modifiers::ALT);
        let quit = map.iter().find(|(_, _, a)| *a == Action::Quit).unwrap();
        assert_eq!(quit.0, Modifiers::ALT | Modifiers::SHIFT);
        assert_eq!(quit.1, keysym::Q);
    }
}
