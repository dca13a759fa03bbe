//! Uniform-cell spatial index for fast bounding-box proximity queries.
//!
//! The grid owns its items: inserting returns a stable index that callers can
//! use as a lightweight id. Cells are kept in a BTreeMap so iteration order is
//! canonical (lexicographic cell coordinates), which the village clusterer
//! relies on for reproducible results.

use std::collections::BTreeMap;

use crate::geom::{Line, Rect};

/// Anything that can report an axis-aligned bounding box.
pub trait Bounded {
    fn bbox(&self) -> Rect;
}

/// Sparse uniform grid. Objects are registered in every cell their bounding
/// box overlaps; the grid never removes objects and is rebuilt per generation
/// run.
pub struct SpatialGrid<T> {
    cell_size: (f64, f64),
    cells: BTreeMap<(i32, i32), Vec<usize>>,
    items: Vec<T>,
}

impl<T: Bounded> SpatialGrid<T> {
    /// Reference cell size used throughout world generation.
    pub const DEFAULT_CELL_SIZE: f64 = 50.0;

    pub fn new(cell_width: f64, cell_height: f64) -> Self {
        assert!(cell_width > 0.0 && cell_height > 0.0, "cell size must be positive");

        Self {
            cell_size: (cell_width, cell_height),
            cells: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    /// Grid with the default 50x50 unit cells, pre-filled from an iterator.
    pub fn with_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut grid = Self::new(Self::DEFAULT_CELL_SIZE, Self::DEFAULT_CELL_SIZE);
        for item in items {
            grid.insert(item);
        }
        grid
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> &T {
        &self.items[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn cell_of(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size.0).floor() as i32,
            (y / self.cell_size.1).floor() as i32,
        )
    }

    fn cell_range(&self, bbox: &Rect) -> ((i32, i32), (i32, i32)) {
        (self.cell_of(bbox.min.x, bbox.min.y), self.cell_of(bbox.max.x, bbox.max.y))
    }

    /// Insert an object, registering it in every overlapped cell. Returns the
    /// object's index, stable for the lifetime of the grid.
    pub fn insert(&mut self, item: T) -> usize {
        let index = self.items.len();
        let (min_cell, max_cell) = self.cell_range(&item.bbox());

        for cy in min_cell.1..=max_cell.1 {
            for cx in min_cell.0..=max_cell.0 {
                self.cells.entry((cx, cy)).or_default().push(index);
            }
        }

        self.items.push(item);
        index
    }

    /// Re-register an already inserted object whose bounding box changed.
    /// Stale registrations from the old box are left behind; `candidates`
    /// filters by the current bounding box, so they only cost a lookup.
    pub(crate) fn reindex(&mut self, index: usize) {
        let bbox = self.items[index].bbox();
        let (min_cell, max_cell) = self.cell_range(&bbox);

        for cy in min_cell.1..=max_cell.1 {
            for cx in min_cell.0..=max_cell.0 {
                let bucket = self.cells.entry((cx, cy)).or_default();
                if !bucket.contains(&index) {
                    bucket.push(index);
                }
            }
        }
    }

    /// Indices of all objects whose bounding box intersects `query`, each
    /// yielded exactly once, in cell-traversal order.
    pub fn candidates(&self, query: &Rect) -> Vec<usize> {
        let (min_cell, max_cell) = self.cell_range(query);

        let mut seen = vec![false; self.items.len()];
        let mut result = Vec::new();

        for cy in min_cell.1..=max_cell.1 {
            for cx in min_cell.0..=max_cell.0 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };

                for &index in bucket {
                    if seen[index] {
                        continue;
                    }
                    seen[index] = true;

                    if self.items[index].bbox().intersects(query) {
                        result.push(index);
                    }
                }
            }
        }

        result
    }

    /// Iterate all cells in canonical (lexicographic coordinate) order,
    /// yielding each cell's bucket of object indices.
    pub fn cells(&self) -> impl Iterator<Item = (&(i32, i32), &Vec<usize>)> {
        self.cells.iter()
    }
}

impl Bounded for Line {
    fn bbox(&self) -> Rect {
        Line::bbox(self)
    }
}
