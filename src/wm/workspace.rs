//! Workspace Module
//!
//! An ordered window sequence with a focused entry, a layout slot, and the
//! focus-fixing rules applied when windows come and go.

use tracing::debug;

use crate::layout::{LayoutParams, LAYOUTS};

/// Workspaces per output.
pub const WORKSPACE_COUNT: usize = 9;

#[derive(Debug)]
pub struct Workspace {
    /// Windows in layout order. Exactly one workspace holds any window.
    pub windows: Vec<u32>,
    /// Focused window id; always a member of `windows` when set.
    pub focused: Option<u32>,
    /// Index into the configured layout list.
    pub layout_index: usize,
    pub params: LayoutParams,
}

impl Workspace {
    pub fn new(params: LayoutParams) -> Self {
        Self { windows: Vec::new(), focused: None, layout_index: 0, params }
    }

    pub fn contains(&self, window: u32) -> bool {
        self.windows.contains(&window)
    }

    /// Append a window. The first window of an empty workspace takes focus.
    pub fn add_window(&mut self, window: u32) {
        if !self.contains(window) {
            self.windows.push(window);
            if self.focused.is_none() {
                self.focused = Some(window);
            }
        }
    }

    /// Remove a window, transferring focus to the next sibling in sequence
    /// (wrapping) or clearing it when the workspace empties.
    pub fn remove_window(&mut self, window: u32) {
        let Some(idx) = self.windows.iter().position(|&w| w == window) else {
            return;
        };
        self.windows.remove(idx);
        if self.focused == Some(window) {
            self.focused = if self.windows.is_empty() {
                None
            } else {
                Some(self.windows[idx % self.windows.len()])
            };
            debug!("focus moved to {:?} after removing {}", self.focused, window);
        }
    }

    /// Rotate focus forward within the windows `eligible` accepts.
    pub fn focus_next(&mut self, eligible: impl Fn(u32) -> bool) {
        self.rotate_focus(1, eligible);
    }

    /// Rotate focus backward within the windows `eligible` accepts.
    pub fn focus_prev(&mut self, eligible: impl Fn(u32) -> bool) {
        self.rotate_focus(-1, eligible);
    }

    fn rotate_focus(&mut self, dir: isize, eligible: impl Fn(u32) -> bool) {
        let ring: Vec<u32> = self.windows.iter().copied().filter(|&w| eligible(w)).collect();
        if ring.is_empty() {
            return;
        }
        let pos = self.focused.and_then(|f| ring.iter().position(|&w| w == f));
        let next = match pos {
            Some(i) => ring[(i as isize + dir).rem_euclid(ring.len() as isize) as usize],
            None => ring[0],
        };
        self.focused = Some(next);
    }

    /// Swap the focused window with its following neighbor; focus follows
    /// the window.
    pub fn swap_next(&mut self) {
        self.swap(1);
    }

    pub fn swap_prev(&mut self) {
        self.swap(-1);
    }

    fn swap(&mut self, dir: isize) {
        let Some(focused) = self.focused else { return };
        let Some(idx) = self.windows.iter().position(|&w| w == focused) else {
            return;
        };
        if self.windows.len() < 2 {
            return;
        }
        let other = (idx as isize + dir).rem_euclid(self.windows.len() as isize) as usize;
        self.windows.swap(idx, other);
    }

    /// Move the focused window to the head of the sequence.
    pub fn promote(&mut self) {
        let Some(focused) = self.focused else { return };
        if let Some(idx) = self.windows.iter().position(|&w| w == focused) {
            if idx != 0 {
                self.windows.remove(idx);
                self.windows.insert(0, focused);
            }
        }
    }

    /// Step the layout index by `dir` modulo the configured layout count.
    pub fn cycle_layout(&mut self, dir: isize, layout_count: usize) {
        debug_assert!(layout_count > 0);
        self.layout_index =
            (self.layout_index as isize + dir).rem_euclid(layout_count as isize) as usize;
    }

    pub fn layout(&self) -> crate::layout::LayoutKind {
        LAYOUTS[self.layout_index % LAYOUTS.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_with(windows: &[u32]) -> Workspace {
        let mut ws = Workspace::new(LayoutParams::default());
        for &w in windows {
            ws.add_window(w);
        }
        ws
    }

    #[test]
    fn close_chain_walks_the_sequence() {
        // [A=1, B=2, C=3] with focus on B
        let mut ws = workspace_with(&[1, 2, 3]);
        ws.focused = Some(2);

        ws.remove_window(2);
        assert_eq!(ws.windows, vec![1, 3]);
        assert_eq!(ws.focused, Some(3));

        ws.remove_window(3);
        assert_eq!(ws.windows, vec![1]);
        assert_eq!(ws.focused, Some(1));

        ws.remove_window(1);
        assert!(ws.windows.is_empty());
        assert_eq!(ws.focused, None);
    }

    #[test]
    fn removing_an_unfocused_window_keeps_focus() {
        let mut ws = workspace_with(&[1, 2, 3]);
        ws.focused = Some(3);
        ws.remove_window(1);
        assert_eq!(ws.focused, Some(3));
    }

    #[test]
    fn focus_rotation_wraps_and_skips_ineligible() {
        let mut ws = workspace_with(&[1, 2, 3, 4]);
        ws.focused = Some(1);
        // 3 is not eligible (e.g. unmapped)
        ws.focus_next(|w| w != 3);
        assert_eq!(ws.focused, Some(2));
        ws.focus_next(|w| w != 3);
        assert_eq!(ws.focused, Some(4));
        ws.focus_next(|w| w != 3);
        assert_eq!(ws.focused, Some(1));
        ws.focus_prev(|w| w != 3);
        assert_eq!(ws.focused, Some(4));
    }

    #[test]
    fn swap_moves_the_window_and_focus_follows() {
        let mut ws = workspace_with(&[1, 2, 3]);
        ws.focused = Some(2);
        ws.swap_next();
        assert_eq!(ws.windows, vec![1, 3, 2]);
        assert_eq!(ws.focused, Some(2));
        ws.swap_next();
        // wraps to the head
        assert_eq!(ws.windows, vec![2, 3, 1]);
    }

    #[test]
    fn promote_moves_focused_to_master() {
        let mut ws = workspace_with(&[1, 2, 3]);
        ws.focused = Some(3);
        ws.promote();
        assert_eq!(ws.windows, vec![3, 1, 2]);
    }

    #[test]
    fn layout_cycling_is_modular_in_both_directions() {
        let mut ws = Workspace::new(LayoutParams::default());
        for _ in 0..7 {
            ws.cycle_layout(1, 6);
        }
        assert_eq!(ws.layout_index, 1);

        ws.layout_index = 0;
        ws.cycle_layout(-1, 6);
        assert_eq!(ws.layout_index, 5);
    }

    #[test]
    fn duplicate_add_is_idempotent() {
        let mut ws = workspace_with(&[1]);
        ws.add_window(1);
        assert_eq!(ws.windows, vec![1]);
    }
}
