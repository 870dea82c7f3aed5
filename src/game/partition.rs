use std::collections::BTreeSet;

use super::constants::{ASPECT_RATIO, NUM_PARTITIONS};
use super::geometry::Aabb;
use super::types::Point;

pub const CELL_COUNT: usize = NUM_PARTITIONS * NUM_PARTITIONS;

fn cell_width() -> f64 {
    2.0 * ASPECT_RATIO / NUM_PARTITIONS as f64
}

fn cell_height() -> f64 {
    2.0 / NUM_PARTITIONS as f64
}

fn column_of(x: f64) -> usize {
    let column = ((x + ASPECT_RATIO) / cell_width()).floor();
    (column.max(0.0) as usize).min(NUM_PARTITIONS - 1)
}

fn row_of(y: f64) -> usize {
    let row = ((y + 1.0) / cell_height()).floor();
    (row.max(0.0) as usize).min(NUM_PARTITIONS - 1)
}

pub fn cell_index(column: usize, row: usize) -> usize {
    row * NUM_PARTITIONS + column
}

// Inclusive (column, row) ranges of the cells a box touches, clamped to the
// field.
pub fn cell_range(aabb: &Aabb) -> (usize, usize, usize, usize) {
    (
        column_of(aabb.min.x),
        column_of(aabb.max.x),
        row_of(aabb.min.y),
        row_of(aabb.max.y),
    )
}

pub fn cell_indices(aabb: &Aabb) -> Vec<usize> {
    let (column_start, column_end, row_start, row_end) = cell_range(aabb);
    let mut indices =
        Vec::with_capacity((column_end - column_start + 1) * (row_end - row_start + 1));
    for row in row_start..=row_end {
        for column in column_start..=column_end {
            indices.push(cell_index(column, row));
        }
    }
    indices
}

#[cfg(test)]
pub fn cell_rect(index: usize) -> Aabb {
    let column = index % NUM_PARTITIONS;
    let row = index / NUM_PARTITIONS;
    let min = Point {
        x: -ASPECT_RATIO + column as f64 * cell_width(),
        y: -1.0 + row as f64 * cell_height(),
    };
    Aabb {
        min,
        max: Point {
            x: min.x + cell_width(),
            y: min.y + cell_height(),
        },
    }
}

// One grid per player: cross-player queries iterate the players, and a round
// reset drops the whole grid without touching anyone else's.
#[derive(Debug, Clone)]
pub struct FieldPartitions {
    cells: Vec<BTreeSet<usize>>,
}

impl FieldPartitions {
    pub fn new() -> Self {
        Self {
            cells: vec![BTreeSet::new(); CELL_COUNT],
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }

    pub fn insert(&mut self, aabb: &Aabb, segment_index: usize) {
        for index in cell_indices(aabb) {
            self.cells[index].insert(segment_index);
        }
    }

    pub fn cell(&self, index: usize) -> &BTreeSet<usize> {
        &self.cells[index]
    }

    #[cfg(test)]
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
    }
}

impl Default for FieldPartitions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::LINE_WIDTH;
    use crate::game::geometry::fat_aabb;
    use crate::game::types::Segment;

    fn aabb(x1: f64, y1: f64, x2: f64, y2: f64) -> Aabb {
        Aabb {
            min: Point { x: x1, y: y1 },
            max: Point { x: x2, y: y2 },
        }
    }

    #[test]
    fn cell_range_clamps_to_field() {
        let (c0, c1, r0, r1) = cell_range(&aabb(-10.0, -10.0, 10.0, 10.0));
        assert_eq!((c0, r0), (0, 0));
        assert_eq!((c1, r1), (NUM_PARTITIONS - 1, NUM_PARTITIONS - 1));
    }

    #[test]
    fn single_point_maps_to_one_cell() {
        let indices = cell_indices(&aabb(0.01, 0.01, 0.01, 0.01));
        assert_eq!(indices.len(), 1);
        let rect = cell_rect(indices[0]);
        assert!(rect.min.x <= 0.01 && rect.max.x >= 0.01);
        assert!(rect.min.y <= 0.01 && rect.max.y >= 0.01);
    }

    #[test]
    fn long_segment_spans_a_row_of_cells() {
        let trail = Segment {
            start: Point { x: -1.4, y: 0.0 },
            end: Point { x: 1.4, y: 0.0 },
        };
        let indices = cell_indices(&fat_aabb(&trail, LINE_WIDTH));
        assert!(indices.len() >= NUM_PARTITIONS);
        for index in &indices {
            assert!(cell_rect(*index).overlaps(&fat_aabb(&trail, LINE_WIDTH)));
        }
    }

    #[test]
    fn inserted_segments_are_found_in_every_touched_cell() {
        let mut partitions = FieldPartitions::new();
        let trail = Segment {
            start: Point { x: 0.0, y: -0.9 },
            end: Point { x: 0.0, y: 0.9 },
        };
        let footprint = fat_aabb(&trail, LINE_WIDTH);
        partitions.insert(&footprint, 3);
        for index in cell_indices(&footprint) {
            assert!(partitions.cell(index).contains(&3));
        }
        partitions.clear();
        for index in cell_indices(&footprint) {
            assert!(partitions.cell(index).is_empty());
        }
    }

    #[test]
    fn occupancy_matches_footprints() {
        let mut partitions = FieldPartitions::new();
        let trail = Segment {
            start: Point { x: -0.2, y: 0.4 },
            end: Point { x: 0.3, y: 0.4 },
        };
        let footprint = fat_aabb(&trail, LINE_WIDTH);
        partitions.insert(&footprint, 0);
        for (index, cell) in partitions.occupied_cells() {
            assert!(cell.contains(&0));
            assert!(cell_rect(index).overlaps(&footprint));
        }
    }
}
