//! 8-connected components of a binary mask, labelled run by run.

use std::cmp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRun {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub row: usize,
    label: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Component {
    pub area: usize,
    pub runs: Vec<RowRun>,
}

impl Component {
    /// First and last pixel of every run. Their convex hull equals the hull
    /// of the whole component.
    pub fn extreme_points(&self) -> Vec<(i32, i32)> {
        let mut points = Vec::with_capacity(self.runs.len() * 2);
        for run in &self.runs {
            points.push((run.start as i32, run.row as i32));
            points.push((run.end as i32 - 1, run.row as i32));
        }
        points
    }
}

pub fn connected_components(mask: &[u8], width: usize, height: usize) -> Vec<Component> {
    assert_eq!(mask.len(), width * height);
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut runs = Vec::new();
    let mut offsets = vec![0usize; height + 1];
    for row in 0..height {
        offsets[row] = runs.len();
        let row_data = &mask[row * width..(row + 1) * width];
        let mut x = 0usize;
        while x < width {
            while x < width && row_data[x] == 0 {
                x += 1;
            }
            if x >= width {
                break;
            }
            let start = x;
            while x < width && row_data[x] != 0 {
                x += 1;
            }
            runs.push(RowRun {
                start,
                end: x,
                row,
                label: 0,
            });
        }
    }
    offsets[height] = runs.len();

    if runs.is_empty() {
        return Vec::new();
    }

    let mut dsu = DisjointSet::new();
    for run in runs.iter_mut() {
        run.label = dsu.make_set();
    }

    for row in 1..height {
        let mut prev = offsets[row - 1];
        let prev_end = offsets[row];
        let mut curr = offsets[row];
        let curr_end = offsets[row + 1];

        while prev < prev_end && curr < curr_end {
            let run_a = runs[prev];
            let run_b = runs[curr];
            if runs_touch(&run_a, &run_b) {
                dsu.union(run_a.label, run_b.label);
            }
            if run_a.end <= run_b.end {
                prev += 1;
            } else {
                curr += 1;
            }
        }
    }

    let mut slots: Vec<Option<usize>> = vec![None; dsu.len()];
    let mut components: Vec<Component> = Vec::new();
    for run in runs {
        let root = dsu.find(run.label) as usize;
        let index = *slots[root].get_or_insert_with(|| {
            components.push(Component::default());
            components.len() - 1
        });
        let component = &mut components[index];
        component.area += run.end - run.start;
        component.runs.push(run);
    }
    components
}

// Runs on adjacent rows touch when they overlap or meet diagonally.
fn runs_touch(a: &RowRun, b: &RowRun) -> bool {
    let overlap = cmp::min(a.end, b.end).saturating_sub(cmp::max(a.start, b.start));
    if overlap > 0 {
        return true;
    }
    a.end == b.start || b.end == a.start
}

struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new() -> Self {
        Self {
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> u32 {
        let idx = self.parent.len() as u32;
        self.parent.push(idx);
        self.rank.push(0);
        idx
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank[root_a as usize];
        let rank_b = self.rank[root_b as usize];
        if rank_a < rank_b {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b as usize] = root_a;
        if rank_a == rank_b {
            self.rank[root_a as usize] = rank_a + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<u8>, usize, usize) {
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
            .collect();
        (data, width, rows.len())
    }

    #[test]
    fn separate_blobs_are_separate_components() {
        let (mask, w, h) = mask_from(&["##..#", "##..#", ".....", "...##"]);
        let mut areas: Vec<usize> = connected_components(&mask, w, h)
            .iter()
            .map(|c| c.area)
            .collect();
        areas.sort();
        assert_eq!(areas, vec![2, 2, 4]);
    }

    #[test]
    fn diagonal_neighbours_join() {
        let (mask, w, h) = mask_from(&["#..", ".#.", "..#"]);
        let components = connected_components(&mask, w, h);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].area, 3);
    }

    #[test]
    fn u_shape_merges_through_later_row() {
        let (mask, w, h) = mask_from(&["#...#", "#...#", "#####"]);
        let components = connected_components(&mask, w, h);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].area, 9);
    }

    #[test]
    fn extreme_points_cover_run_ends() {
        let (mask, w, h) = mask_from(&[".###."]);
        let components = connected_components(&mask, w, h);
        assert_eq!(components[0].extreme_points(), vec![(1, 0), (3, 0)]);
    }

    #[test]
    fn empty_mask_has_no_components() {
        assert!(connected_components(&[0; 12], 4, 3).is_empty());
    }
}
