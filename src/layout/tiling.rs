//! Master-stack tiling, horizontal (tile-right) and transposed
//! (tile-bottom).

use crate::protocol::types::Area;

use super::{split_even, LayoutGeometry, LayoutInput, LayoutParams};

/// With `transposed` false the masters form the left column; true flips
/// every axis so the masters form the top row.
pub fn calculate(
    windows: &[u32],
    area: Area,
    params: &LayoutParams,
    input: &LayoutInput,
    transposed: bool,
) -> Vec<(u32, LayoutGeometry)> {
    let n = windows.len();
    let gap = params.inner_gap;
    let master_n = params.master_count.max(1).min(n);
    let stack_n = n - master_n;

    let (span, cross) = if transposed {
        (area.height, area.width)
    } else {
        (area.width, area.height)
    };

    let mut out = Vec::with_capacity(n);
    let mut place = |id: u32, main_off: i32, main_size: i32, cross_off: i32, cross_size: i32| {
        let (x, y, w, h) = if transposed {
            (area.x + cross_off, area.y + main_off, cross_size, main_size)
        } else {
            (area.x + main_off, area.y + cross_off, main_size, cross_size)
        };
        out.push((
            id,
            LayoutGeometry {
                x,
                y,
                width: w,
                height: h,
                border: input.border_for(id),
                visible: true,
            },
        ));
    };

    if stack_n == 0 {
        // Single column of full width.
        for (id, (off, size)) in windows.iter().zip(split_even(cross, n, gap)) {
            place(*id, 0, span, off, size);
        }
        return out;
    }

    let master_size = (((span - gap) as f64) * params.master_ratio) as i32;
    let stack_size = span - gap - master_size;

    for (id, (off, size)) in windows[..master_n]
        .iter()
        .zip(split_even(cross, master_n, gap))
    {
        place(*id, 0, master_size, off, size);
    }
    for (id, (off, size)) in windows[master_n..]
        .iter()
        .zip(split_even(cross, stack_n, gap))
    {
        place(*id, master_size + gap, stack_size, off, size);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::{calculate, test_util, LayoutInput, LayoutKind, LayoutParams};
    use crate::protocol::types::Area;

    fn params(gap: i32) -> LayoutParams {
        LayoutParams { master_count: 1, master_ratio: 0.5, inner_gap: gap, tab_height: 24 }
    }

    #[test]
    fn three_windows_split_master_and_stack() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: Some(1), urgent: &urgent, floating: &floating };
        let area = Area::new(0, 0, 1000, 1000);
        let out = calculate(LayoutKind::TileRight, &[1, 2, 3], area, &params(10), &input);

        let rects: Vec<_> = out.iter().map(|(_, g)| (g.x, g.y, g.width, g.height)).collect();
        assert_eq!(rects[0], (0, 0, 495, 1000));
        assert_eq!(rects[1], (505, 0, 495, 495));
        assert_eq!(rects[2], (505, 505, 495, 495));

        // Columns partition the area exactly, gaps included.
        assert_eq!(495 + 10 + 495, area.width);
        assert_eq!(495 + 10 + 495, area.height);
        test_util::assert_partition(&out, area);
    }

    #[test]
    fn master_count_at_or_above_window_count_makes_one_column() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let mut p = params(10);
        p.master_count = 5;
        let area = Area::new(0, 0, 800, 600);
        let out = calculate(LayoutKind::TileRight, &[1, 2], area, &p, &input);
        for (_, g) in &out {
            assert_eq!(g.width, 800);
        }
        assert_eq!(out[0].1.height + 10 + out[1].1.height, 600);
    }

    #[test]
    fn tile_bottom_is_the_transpose() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let area = Area::new(0, 0, 1000, 1000);
        let out = calculate(LayoutKind::TileBottom, &[1, 2, 3], area, &params(10), &input);

        let rects: Vec<_> = out.iter().map(|(_, g)| (g.x, g.y, g.width, g.height)).collect();
        assert_eq!(rects[0], (0, 0, 1000, 495));
        assert_eq!(rects[1], (0, 505, 495, 495));
        assert_eq!(rects[2], (505, 505, 495, 495));
        test_util::assert_partition(&out, area);
    }

    #[test]
    fn remainder_pixels_go_to_the_first_stack_windows() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let area = Area::new(0, 0, 999, 1000);
        let out = calculate(LayoutKind::TileRight, &[1, 2, 3, 4], area, &params(3), &input);
        // Stack of three in 1000 - 2 gaps = 994 px: 332, 331, 331.
        let heights: Vec<_> = out[1..].iter().map(|(_, g)| g.height).collect();
        assert_eq!(heights, vec![332, 331, 331]);
        let sum: i32 = heights.iter().sum();
        assert_eq!(sum + 2 * 3, area.height);
    }

    #[test]
    fn focused_window_gets_the_focused_border() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: Some(2), urgent: &urgent, floating: &floating };
        let area = Area::new(0, 0, 640, 480);
        let out = calculate(LayoutKind::TileRight, &[1, 2], area, &params(0), &input);
        assert_eq!(out[0].1.border, super::super::BorderKind::Normal);
        assert_eq!(out[1].1.border, super::super::BorderKind::Focused);
    }
}
