pub type Point = (i32, i32);

/// Andrew's monotone chain. Returns the hull counter-clockwise without
/// collinear points; degenerate inputs yield one or two points.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    (a.0 - o.0) as i64 * (b.1 - o.1) as i64 - (a.1 - o.1) as i64 * (b.0 - o.0) as i64
}

/// Fills a convex polygon, vertices and edges included.
pub fn fill_convex_polygon(
    mask: &mut [u8],
    width: usize,
    height: usize,
    polygon: &[Point],
    value: u8,
) {
    assert_eq!(mask.len(), width * height);
    if polygon.is_empty() || width == 0 || height == 0 {
        return;
    }
    let min_y = polygon.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let max_y = polygon
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(height as i32 - 1);

    for y in min_y..=max_y {
        let mut left = f32::INFINITY;
        let mut right = f32::NEG_INFINITY;
        for (i, &p) in polygon.iter().enumerate() {
            let q = polygon[(i + 1) % polygon.len()];
            let (lo, hi) = if p.1 <= q.1 { (p, q) } else { (q, p) };
            if y < lo.1 || y > hi.1 {
                continue;
            }
            if lo.1 == hi.1 {
                left = left.min(lo.0.min(hi.0) as f32);
                right = right.max(lo.0.max(hi.0) as f32);
                continue;
            }
            let t = (y - lo.1) as f32 / (hi.1 - lo.1) as f32;
            let x = lo.0 as f32 + t * (hi.0 - lo.0) as f32;
            left = left.min(x);
            right = right.max(x);
        }
        if left > right {
            continue;
        }
        let start = (left.round() as i32).max(0);
        let end = (right.round() as i32).min(width as i32 - 1);
        if start > end {
            continue;
        }
        let row = y as usize * width;
        mask[row + start as usize..=row + end as usize].fill(value);
    }
}
