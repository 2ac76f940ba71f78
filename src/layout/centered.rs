//! Centered master: the master column sits in the middle, remaining
//! windows alternate onto the right and left stacks, starting with the
//! right. With one or zero stack windows this degenerates to tile-right.

use crate::protocol::types::Area;

use super::{split_even, tiling, LayoutGeometry, LayoutInput, LayoutParams};

pub fn calculate(
    windows: &[u32],
    area: Area,
    params: &LayoutParams,
    input: &LayoutInput,
) -> Vec<(u32, LayoutGeometry)> {
    let n = windows.len();
    let gap = params.inner_gap;
    let master_n = params.master_count.max(1).min(n);
    let stack_n = n - master_n;

    if stack_n <= 1 {
        return tiling::calculate(windows, area, params, input, false);
    }

    let mut right: Vec<u32> = Vec::new();
    let mut left: Vec<u32> = Vec::new();
    for (i, &id) in windows.iter().enumerate().skip(master_n) {
        // Parity within the stack, so the first stack window goes right
        // no matter how many masters precede it.
        if (i - master_n) % 2 == 0 {
            right.push(id);
        } else {
            left.push(id);
        }
    }

    let master_w = ((area.width - 2 * gap) as f64 * params.master_ratio) as i32;
    let sides = area.width - master_w - 2 * gap;
    let left_w = sides / 2 + sides % 2;
    let right_w = sides - left_w;
    let master_x = area.x + left_w + gap;
    let right_x = master_x + master_w + gap;

    let mut out = Vec::with_capacity(n);
    let mut column = |ids: &[u32], x: i32, width: i32, out: &mut Vec<(u32, LayoutGeometry)>| {
        for (id, (off, size)) in ids.iter().zip(split_even(area.height, ids.len(), gap)) {
            out.push((
                *id,
                LayoutGeometry {
                    x,
                    y: area.y + off,
                    width,
                    height: size,
                    border: input.border_for(*id),
                    visible: true,
                },
            ));
        }
    };

    column(&windows[..master_n], master_x, master_w, &mut out);
    column(&right, right_x, right_w, &mut out);
    column(&left, area.x, left_w, &mut out);
    out
}
