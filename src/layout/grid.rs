//! Grid: ceil(sqrt(n)) columns, cells in a short last row widen to fill
//! the full width.

use crate::protocol::types::Area;

use super::{split_even, LayoutGeometry, LayoutInput, LayoutParams};

pub fn calculate(
    windows: &[u32],
    area: Area,
    params: &LayoutParams,
    input: &LayoutInput,
) -> Vec<(u32, LayoutGeometry)> {
    let n = windows.len();
    let gap = params.inner_gap;

    let mut cols = 1usize;
    while cols * cols < n {
        cols += 1;
    }
    let rows = n.div_ceil(cols);

    let row_spans = split_even(area.height, rows, gap);
    let mut out = Vec::with_capacity(n);
    for (row, (y_off, row_h)) in row_spans.iter().enumerate() {
        let start = row * cols;
        let in_row = cols.min(n - start);
        let col_spans = split_even(area.width, in_row, gap);
        for (col, (x_off, col_w)) in col_spans.iter().enumerate() {
            let id = windows[start + col];
            out.push((
                id,
                LayoutGeometry {
                    x: area.x + x_off,
                    y: area.y + y_off,
                    width: *col_w,
                    height: *row_h,
                    border: input.border_for(id),
                    visible: true,
                },
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::{calculate, test_util, LayoutInput, LayoutKind, LayoutParams};
    use crate::protocol::types::Area;

    fn run(n: u32, area: Area, gap: i32) -> Vec<(u32, super::LayoutGeometry)> {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let windows: Vec<u32> = (1..=n).collect();
        let params = LayoutParams { inner_gap: gap, ..Default::default() };
        calculate(LayoutKind::Grid, &windows, area, &params, &input)
    }

    #[test]
    fn four_windows_make_a_two_by_two_grid() {
        let area = Area::new(0, 0, 800, 600);
        let out = run(4, area, 0);
        let rects: Vec<_> = out.iter().map(|(_, g)| (g.x, g.y, g.width, g.height)).collect();
        assert_eq!(rects[0], (0, 0, 400, 300));
        assert_eq!(rects[1], (400, 0, 400, 300));
        assert_eq!(rects[2], (0, 300, 400, 300));
        assert_eq!(rects[3], (400, 300, 400, 300));
        test_util::assert_partition(&out, area);
    }

    #[test]
    fn short_last_row_expands_to_full_width() {
        let area = Area::new(0, 0, 900, 600);
        let out = run(3, area, 0);
        // 2 columns, 2 rows; the lone window in row 1 spans the width.
        assert_eq!(out[2].1.width, 900);
        assert_eq!(out[2].1.y, 300);
        test_util::assert_partition(&out, area);
    }

    #[test]
    fn grid_with_gaps_still_partitions_the_area() {
        let area = Area::new(0, 0, 1001, 799);
        for n in 1..=9 {
            let out = run(n, area, 7);
            test_util::assert_partition(&out, area);
        }
    }
}
