//! Operations Module
//!
//! Interactive pointer move and resize gestures. A gesture latches the
//! window's geometry at the start; deltas from the compositor produce a
//! new floating rectangle, applied by the manager.

use crate::protocol::types::{Area, WindowEdges};

const MIN_SIZE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Move,
    Resize,
}

/// An in-flight gesture. At most one exists at a time.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub kind: OpKind,
    pub window: u32,
    pub seat: u32,
    pub start: Area,
    pub edges: WindowEdges,
    /// Set on the first delta; the window floats from that point on.
    pub moved: bool,
}

impl Operation {
    pub fn new_move(window: u32, seat: u32, start: Area) -> Self {
        Self { kind: OpKind::Move, window, seat, start, edges: WindowEdges::empty(), moved: false }
    }

    pub fn new_resize(window: u32, seat: u32, start: Area, edges: WindowEdges) -> Self {
        Self { kind: OpKind::Resize, window, seat, start, edges, moved: false }
    }

    /// Geometry after the pointer has travelled (dx, dy) from the start of
    /// the gesture.
    pub fn apply_delta(&self, dx: i32, dy: i32) -> Area {
        match self.kind {
            OpKind::Move => Area::new(
                self.start.x + dx,
                self.start.y + dy,
                self.start.width,
                self.start.height,
            ),
            OpKind::Resize => {
                let mut rect = self.start;
                if self.edges.contains(WindowEdges::RIGHT) {
                    rect.width = (self.start.width + dx).max(MIN_SIZE);
                } else if self.edges.contains(WindowEdges::LEFT) {
                    rect.width = (self.start.width - dx).max(MIN_SIZE);
                    rect.x = self.start.x + self.start.width - rect.width;
                }
                if self.edges.contains(WindowEdges::BOTTOM) {
                    rect.height = (self.start.height + dy).max(MIN_SIZE);
                } else if self.edges.contains(WindowEdges::TOP) {
                    rect.height = (self.start.height - dy).max(MIN_SIZE);
                    rect.y = self.start.y + self.start.height - rect.height;
                }
                rect
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_translates_without_resizing() {
        let op = Operation::new_move(1, 2, Area::new(100, 100, 640, 480));
        let rect = op.apply_delta(30, -20);
        assert_eq!(rect, Area::new(130, 80, 640, 480));
    }

    #[test]
    fn bottom_right_resize_grows_in_place() {
        let op = Operation::new_resize(
            1,
            2,
            Area::new(100, 100, 640, 480),
            WindowEdges::RIGHT | WindowEdges::BOTTOM,
        );
        let rect = op.apply_delta(50, 70);
        assert_eq!(rect, Area::new(100, 100, 690, 550));
    }

    #[test]
    fn top_left_resize_keeps_the_opposite_corner() {
        let op = Operation::new_resize(
            1,
            2,
            Area::new(100, 100, 640, 480),
            WindowEdges::LEFT | WindowEdges::TOP,
        );
        let rect = op.apply_delta(40, 40);
        assert_eq!(rect, Area::new(140, 140, 600, 440));
        // Opposite corner stays put.
        assert_eq!(rect.x + rect.width, 740);
        assert_eq!(rect.y + rect.height, 580);
    }

    #[test]
    fn resize_clamps_to_the_minimum_size() {
        let op = Operation::new_resize(
            1,
            2,
            Area::new(0, 0, 300, 300),
            WindowEdges::RIGHT | WindowEdges::BOTTOM,
        );
        let rect = op.apply_delta(-1000, -1000);
        assert_eq!((rect.width, rect.height), (100, 100));
    }
}
