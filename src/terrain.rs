//! River generation.
//!
//! Rivers are directed random walks over a low-frequency noise field: the walk
//! starts outside the world, aims at the center, and greedily turns towards
//! the highest noise value within a small fan of candidate headings. Accepted
//! centerlines are buffered into a wide outline polygon whose boundary edges
//! are indexed in a spatial grid, so the street generator can answer
//! "does this segment cross water" queries cheaply.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::density::{DensityField, RIVER_FREQUENCY};
use crate::geom::{Line, Rect, Vec2};
use crate::grid::SpatialGrid;

/// Hard cap on walk length; longer paths are treated as failed candidates.
const MAX_WALK_POINTS: usize = 1000;

/// A candidate must touch the inner world rectangle for at least this many
/// points, otherwise it barely clips a corner and is rejected.
const MIN_INSIDE_POINTS: usize = 40;

/// Candidate walks per river before the river is skipped entirely. The
/// original looped forever here; a pathological seed must still terminate.
const MAX_RIVER_ATTEMPTS: usize = 100;

/// River widths are sampled uniformly from this range (world units).
const WIDTH_RANGE: std::ops::Range<f64> = 300.0..600.0;

/// Arc subdivision step for rounded end caps, in radians.
const CAP_STEP: f64 = std::f64::consts::PI / 8.0;

/// A single generated river: centerline plus buffered outline.
pub struct River {
    /// Centerline as an ordered polyline of segments.
    pub lines: Vec<Line>,
    /// Stroke width of the buffered outline.
    pub width: f64,
    /// Closed outline polygon of the buffered stroke.
    pub outline: Vec<Vec2>,
    /// Outline boundary edges, indexed for intersection queries.
    outline_grid: SpatialGrid<Line>,
}

impl River {
    /// All centerline points in order.
    pub fn points(&self) -> Vec<Vec2> {
        let mut points = Vec::with_capacity(self.lines.len() + 1);
        if let Some(first) = self.lines.first() {
            points.push(first.start);
        }
        for line in &self.lines {
            points.push(line.end);
        }
        points
    }

    /// Nearest crossing of `line` with this river's outline, measured from
    /// `line.start`. Returns the crossing point and the outline edge hit.
    pub fn crossing(&self, line: &Line) -> Option<(Vec2, Line)> {
        let mut best: Option<(Vec2, Line)> = None;
        let mut best_dist = f64::MAX;

        for index in self.outline_grid.candidates(&line.bbox()) {
            let edge = *self.outline_grid.get(index);
            if let Some(point) = line.intersection(&edge) {
                let dist = line.start.distance_squared_to(point);
                if dist < best_dist {
                    best_dist = dist;
                    best = Some((point, edge));
                }
            }
        }

        best
    }

    /// True if any outline edge lies within `margin` of `point`.
    pub fn near(&self, point: Vec2, margin: f64) -> bool {
        let query = Rect::new(point - Vec2::splat(margin), point + Vec2::splat(margin));
        self.outline_grid
            .candidates(&query)
            .into_iter()
            .any(|index| self.outline_grid.get(index).distance_to_point(point) <= margin)
    }
}

/// All generated water features.
#[derive(Default)]
pub struct Terrain {
    pub rivers: Vec<River>,
}

impl Terrain {
    /// Nearest water crossing of `line` across all rivers.
    pub fn water_crossing(&self, line: &Line) -> Option<(Vec2, Line)> {
        let mut best: Option<(Vec2, Line)> = None;
        let mut best_dist = f64::MAX;

        for river in &self.rivers {
            if let Some((point, edge)) = river.crossing(line) {
                let dist = line.start.distance_squared_to(point);
                if dist < best_dist {
                    best_dist = dist;
                    best = Some((point, edge));
                }
            }
        }

        best
    }

    pub fn near_water(&self, point: Vec2, margin: f64) -> bool {
        self.rivers.iter().any(|river| river.near(point, margin))
    }
}

/// Test fixture: water defined directly by its outline edges, skipping the
/// random walk and the buffering.
#[cfg(test)]
pub(crate) fn water_strip(edges: Vec<Line>) -> Terrain {
    Terrain {
        rivers: vec![River {
            lines: Vec::new(),
            width: 0.0,
            outline: Vec::new(),
            outline_grid: SpatialGrid::with_items(edges),
        }],
    }
}

/// Generates rivers one at a time into a `Terrain`.
pub struct TerrainGenerator {
    noise: DensityField,
    /// Clip rect of the world. No need to generate outside of it.
    world: Rect,
    terrain: Terrain,
}

impl TerrainGenerator {
    pub fn new(rng: &mut ChaCha8Rng, world: Rect) -> Self {
        Self {
            noise: DensityField::new(rng.gen(), RIVER_FREQUENCY),
            world,
            terrain: Terrain::default(),
        }
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn into_terrain(self) -> Terrain {
        self.terrain
    }

    /// Generate one river. Returns false if no acceptable candidate was found
    /// within the retry budget; the terrain is left unchanged in that case.
    pub fn generate_river(&mut self, rng: &mut ChaCha8Rng) -> bool {
        for _ in 0..MAX_RIVER_ATTEMPTS {
            let Some(mut lines) = self.river_candidate(rng) else {
                continue;
            };

            // check against previously accepted rivers: a new river may touch
            // an old one in a single junction point but never run across it
            for river in &self.terrain.rivers {
                truncate_at_first_intersection(&mut lines, &river.lines);
            }

            if lines.len() < 2 {
                // truncated down to almost nothing, try a different path
                continue;
            }

            let width = rng.gen_range(WIDTH_RANGE);
            let points = polyline_points(&lines);
            let outline = buffer_polyline(&points, width);
            let outline_grid = SpatialGrid::with_items(polygon_edges(&outline));

            self.terrain.rivers.push(River {
                lines,
                width,
                outline,
                outline_grid,
            });
            return true;
        }

        false
    }

    /// One random walk attempt. Returns the centerline or None if the path is
    /// too long, loops onto itself, or barely touches the world.
    fn river_candidate(&self, rng: &mut ChaCha8Rng) -> Option<Vec<Line>> {
        let step = self.world.width() / 100.0;
        let look_ahead = step * 10.0;

        // pad the world by 10% so rivers enter and leave off-screen
        let outer = self.world.expanded(self.world.width() * 0.1);

        let mut pos = outer_start(rng, &outer, &self.world)?;
        let mut dir = (self.world.center() - pos).normalized();

        let mut points = vec![pos];
        let mut inside_count = 0usize;

        loop {
            pos = pos + dir * step;
            points.push(pos);

            if points.len() > MAX_WALK_POINTS {
                // endless loop maybe, try a different path
                return None;
            }

            if self.world.contains(pos) {
                inside_count += 1;
            }

            if !outer.contains(pos) {
                break;
            }

            // sample a fan of candidate headings ahead of the current
            // position and climb towards the best noise value
            let mut best_angle = 0.0;
            let mut best_value = f64::MIN;

            let mut deg = -10.0f64;
            while deg <= 10.0 {
                let angle = deg.to_radians();
                let probe = pos + dir.rotated(angle) * look_ahead;
                let value = self.noise.sample_signed(probe);

                if value > best_value {
                    best_value = value;
                    best_angle = angle;
                }

                deg += 0.1;
            }

            dir = dir.rotated(best_angle);
        }

        if inside_count < MIN_INSIDE_POINTS {
            // river not really touching the map
            return None;
        }

        if has_loop(&points, step * 0.99) {
            // broken river, discard this one
            return None;
        }

        Some(points_to_lines(&points))
    }
}

/// Find a starting point inside `outer` but outside `inner`.
fn outer_start(rng: &mut ChaCha8Rng, outer: &Rect, inner: &Rect) -> Option<Vec2> {
    for _ in 0..1000 {
        let point = Vec2::new(
            rng.gen_range(outer.min.x..outer.max.x),
            rng.gen_range(outer.min.y..outer.max.y),
        );

        if !inner.contains(point) {
            return Some(point);
        }
    }

    None
}

/// True if any two distinct path points are closer than `threshold`.
/// Successive points sit exactly one step apart, so they always pass.
fn has_loop(points: &[Vec2], threshold: f64) -> bool {
    let threshold_sq = threshold * threshold;

    for (ia, a) in points.iter().enumerate() {
        for (ib, b) in points.iter().enumerate() {
            if ia != ib && a.distance_squared_to(*b) < threshold_sq {
                return true;
            }
        }
    }

    false
}

fn points_to_lines(points: &[Vec2]) -> Vec<Line> {
    points
        .windows(2)
        .map(|pair| Line::new(pair[0], pair[1]))
        .collect()
}

fn polyline_points(lines: &[Line]) -> Vec<Vec2> {
    let mut points = Vec::with_capacity(lines.len() + 1);
    if let Some(first) = lines.first() {
        points.push(first.start);
    }
    for line in lines {
        points.push(line.end);
    }
    points
}

/// Shorten `lines` at the first intersection with any of `others`, keeping
/// the truncated segment so the two centerlines share a junction point.
fn truncate_at_first_intersection(lines: &mut Vec<Line>, others: &[Line]) {
    for idx in 0..lines.len() {
        for other in others {
            if let Some(point) = lines[idx].intersection(other) {
                lines[idx].end = point;
                lines.truncate(idx + 1);
                return;
            }
        }
    }
}

/// Buffer a polyline into a closed stroke polygon with rounded joins and end
/// caps. Joins use the averaged neighbor normal; the walk turns at most 10
/// degrees per step, so the miter error stays well below a world unit.
fn buffer_polyline(points: &[Vec2], width: f64) -> Vec<Vec2> {
    let half = width / 2.0;
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let direction_at = |i: usize| -> Vec2 {
        let incoming = if i > 0 {
            (points[i] - points[i - 1]).normalized()
        } else {
            Vec2::ZERO
        };
        let outgoing = if i + 1 < n {
            (points[i + 1] - points[i]).normalized()
        } else {
            Vec2::ZERO
        };
        (incoming + outgoing).normalized()
    };

    let mut left = Vec::with_capacity(n);
    let mut right = Vec::with_capacity(n);

    for i in 0..n {
        let normal = direction_at(i).perpendicular() * half;
        left.push(points[i] + normal);
        right.push(points[i] - normal);
    }

    let mut outline = left;

    // rounded end cap: sweep the normal from the left side to the right side
    append_cap(&mut outline, points[n - 1], direction_at(n - 1), half);

    right.reverse();
    outline.extend(right);

    // rounded start cap closes the polygon back to the first left point
    append_cap(&mut outline, points[0], -direction_at(0), half);

    outline
}

/// Append a half-circle of cap points around `center`, sweeping from the left
/// offset towards the right offset of a stroke heading in `dir`.
fn append_cap(outline: &mut Vec<Vec2>, center: Vec2, dir: Vec2, half: f64) {
    let normal = dir.perpendicular();

    let mut angle = CAP_STEP;
    while angle < std::f64::consts::PI {
        // rotating the left normal clockwise sweeps it across the cap
        outline.push(center + normal.rotated(-angle) * half);
        angle += CAP_STEP;
    }
}

/// Boundary edges of a closed polygon, including the closing edge.
fn polygon_edges(polygon: &[Vec2]) -> Vec<Line> {
    let n = polygon.len();
    let mut edges = Vec::with_capacity(n);

    for i in 0..n {
        edges.push(Line::new(polygon[i], polygon[(i + 1) % n]));
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn world() -> Rect {
        Rect::new(Vec2::ZERO, Vec2::splat(32_000.0))
    }

    #[test]
    fn test_has_loop() {
        let straight = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
        ];
        assert!(!has_loop(&straight, 9.9));

        let folded = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(1.0, 1.0),
        ];
        assert!(has_loop(&folded, 9.9));
    }

    #[test]
    fn test_buffer_outline_hugs_centerline() {
        let points: Vec<Vec2> = (0..20).map(|i| Vec2::new(i as f64 * 100.0, 0.0)).collect();
        let width = 400.0;
        let outline = buffer_polyline(&points, width);

        assert!(outline.len() >= points.len() * 2);

        for vertex in &outline {
            let min_dist = points
                .iter()
                .map(|p| p.distance_to(*vertex))
                .fold(f64::MAX, f64::min);
            assert!(min_dist <= width / 2.0 + 1.0, "vertex too far: {}", min_dist);
            assert!(min_dist >= width / 2.0 * 0.8, "vertex too close: {}", min_dist);
        }
    }

    #[test]
    fn test_truncate_at_first_intersection() {
        let mut lines = points_to_lines(&[
            Vec2::new(0.0, 5.0),
            Vec2::new(10.0, 5.0),
            Vec2::new(20.0, 5.0),
        ]);
        let others = points_to_lines(&[Vec2::new(5.0, 0.0), Vec2::new(5.0, 10.0)]);

        truncate_at_first_intersection(&mut lines, &others);
        assert_eq!(lines.len(), 1);
        assert!((lines[0].end.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_river_generation_is_deterministic() {
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            let mut gen = TerrainGenerator::new(&mut rng, world());
            gen.generate_river(&mut rng);
            gen.generate_river(&mut rng);
            gen.into_terrain()
        };

        let a = run();
        let b = run();

        assert_eq!(a.rivers.len(), b.rivers.len());
        for (ra, rb) in a.rivers.iter().zip(&b.rivers) {
            assert_eq!(ra.points(), rb.points());
            assert_eq!(ra.width, rb.width);
            assert_eq!(ra.outline, rb.outline);
        }
    }

    #[test]
    fn test_generated_river_touches_world() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut gen = TerrainGenerator::new(&mut rng, world());

        assert!(gen.generate_river(&mut rng));

        let river = &gen.terrain().rivers[0];
        let inside = river
            .points()
            .iter()
            .filter(|p| world().contains(**p))
            .count();
        assert!(inside >= MIN_INSIDE_POINTS);
        assert!(!river.outline.is_empty());
    }
}
