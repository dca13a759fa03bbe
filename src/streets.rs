//! Street network growth automaton.
//!
//! Streets grow from a min-priority queue of pending growth points. Each call
//! to `next` pops the lowest-step point and produces at most one new segment,
//! so the driver can spread generation across time slices. Highways grow
//! first and fork occasionally; local streets branch off into high-density
//! neighbourhoods at a large step offset, deferring them until the highway
//! skeleton is done.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::density::{DensityField, STREET_FREQUENCY};
use crate::geom::{Line, Rect, Vec2};
use crate::grid::{Bounded, SpatialGrid};
use crate::terrain::Terrain;

/// Segment lengths are sampled uniformly from this range.
const LENGTH_RANGE: std::ops::Range<f64> = 50.0..80.0;

/// Maximum heading jitter for a continuation, in radians.
const MAX_JITTER: f64 = std::f64::consts::PI / 180.0;

/// Snap the free end onto a nearby existing endpoint within this distance.
const CONNECT_THRESHOLD: f64 = 30.0;

/// Local streets live only where the population field is above this.
const LOCAL_DENSITY_THRESHOLD: f64 = 0.25;

/// Local streets die with this probability even in dense areas.
const LOCAL_DEATH_PROBABILITY: f64 = 0.1;

/// Density above which a highway may fork once far enough from the last fork.
const HIGHWAY_FORK_DENSITY: f64 = 0.1;

/// A highway crossing a river at a shallow angle is discarded instead of
/// bridged. Compared against |sin| of the angle between street and bank.
const NEAR_PARALLEL_LIMIT: f64 = 0.25;

/// How far past a river bank a bridge probe may reach before giving up.
const MAX_BRIDGE_SPAN: f64 = 800.0;

/// Extra length past the far bank so a bridge lands on dry ground.
const BRIDGE_OVERHANG: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u32);

impl SegmentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreetKind {
    Highway,
    Local,
}

/// One street segment. Geometry is fixed after the generator finishes with
/// it; only the adjacency list grows as later segments connect.
#[derive(Debug, Clone)]
pub struct Segment {
    pub line: Line,
    pub kind: StreetKind,
    pub connections: Vec<SegmentId>,
    /// Set when a highway was truncated at a river bank.
    pub ends_at_water: bool,
}

impl Segment {
    pub fn length(&self) -> f64 {
        self.line.length()
    }

    pub fn angle(&self) -> f64 {
        self.line.start.angle_to_point(self.line.end)
    }

    pub fn connected_to(&self, other: SegmentId) -> bool {
        self.connections.contains(&other)
    }
}

impl Bounded for Segment {
    fn bbox(&self) -> Rect {
        self.line.bbox()
    }
}

/// A queued growth point. Ordered by priority step, ties broken by insertion
/// order so the growth is fully reproducible.
struct PendingStreet {
    previous: Option<SegmentId>,
    point: Vec2,
    heading: f64,
    fork_distance: f64,
    kind: StreetKind,
    at_step: u64,
    seq: u64,
}

impl PartialEq for PendingStreet {
    fn eq(&self, other: &Self) -> bool {
        self.at_step == other.at_step && self.seq == other.seq
    }
}

impl Eq for PendingStreet {}

impl PartialOrd for PendingStreet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingStreet {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the lowest step first
        (other.at_step, other.seq).cmp(&(self.at_step, self.seq))
    }
}

/// Tunables for a street generation run.
pub struct StreetParams {
    /// Segments with both endpoints outside this rect are discarded.
    pub clip: Rect,
    /// Minimum distance between growth seed points.
    pub seed_spacing: f64,
    /// Minimum distance between a growth seed and any river outline.
    pub seed_water_margin: f64,
}

impl Default for StreetParams {
    fn default() -> Self {
        Self {
            clip: Rect::new(Vec2::ZERO, Vec2::splat(32_000.0)),
            seed_spacing: 5_000.0,
            seed_water_margin: 300.0,
        }
    }
}

/// Incremental street network generator.
pub struct StreetGenerator<'a> {
    params: StreetParams,
    terrain: &'a Terrain,
    density: DensityField,
    queue: BinaryHeap<PendingStreet>,
    grid: SpatialGrid<Segment>,
    seeds: Vec<Vec2>,
    seq: u64,
}

impl<'a> StreetGenerator<'a> {
    pub fn new(rng: &mut ChaCha8Rng, params: StreetParams, terrain: &'a Terrain) -> Self {
        Self {
            params,
            terrain,
            density: DensityField::new(rng.gen(), STREET_FREQUENCY),
            queue: BinaryHeap::new(),
            grid: SpatialGrid::with_items([]),
            seeds: Vec::new(),
            seq: 0,
        }
    }

    pub fn population_at(&self, point: Vec2) -> f64 {
        self.density.sample(point)
    }

    pub fn grid(&self) -> &SpatialGrid<Segment> {
        &self.grid
    }

    pub fn segments(&self) -> &[Segment] {
        self.grid.items()
    }

    pub fn into_grid(self) -> SpatialGrid<Segment> {
        self.grid
    }

    /// Place one seed: a pair of opposing highway growth points at a spot far
    /// enough from previous seeds and from water. Returns false if no such
    /// spot was found within the retry budget.
    pub fn seed_growth(&mut self, rng: &mut ChaCha8Rng) -> bool {
        let clip = self.params.clip;

        for _ in 0..100 {
            let point = Vec2::new(
                rng.gen_range(clip.min.x..clip.max.x),
                rng.gen_range(clip.min.y..clip.max.y),
            );

            let spaced = self
                .seeds
                .iter()
                .all(|seed| seed.distance_to(point) >= self.params.seed_spacing);

            if !spaced || self.terrain.near_water(point, self.params.seed_water_margin) {
                continue;
            }

            let heading = rng.gen_range(0.0..std::f64::consts::TAU);

            self.seeds.push(point);
            self.push(PendingStreet {
                previous: None,
                point,
                heading,
                fork_distance: 0.0,
                kind: StreetKind::Highway,
                at_step: 0,
                seq: 0,
            });
            self.push(PendingStreet {
                previous: None,
                point,
                heading: heading + std::f64::consts::PI,
                fork_distance: 0.0,
                kind: StreetKind::Highway,
                at_step: 0,
                seq: 0,
            });

            return true;
        }

        false
    }

    /// True while growth points are still queued.
    pub fn more(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Keep producing segments until the queue drains or `budget` elapses.
    /// Returns the number of segments created.
    pub fn run_for(&mut self, rng: &mut ChaCha8Rng, budget: Duration) -> usize {
        let started = Instant::now();
        let mut created = 0;

        while self.more() && started.elapsed() < budget {
            if self.next(rng).is_some() {
                created += 1;
            }
        }

        created
    }

    /// Drain the queue completely.
    pub fn run_to_completion(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let mut created = 0;
        while self.more() {
            if self.next(rng).is_some() {
                created += 1;
            }
        }
        created
    }

    fn push(&mut self, mut pending: PendingStreet) {
        self.seq += 1;
        pending.seq = self.seq;
        self.queue.push(pending);
    }

    /// Advance growth by one step: pop the lowest-step pending point and try
    /// to grow one segment from it. Returns the new segment's id, or None if
    /// the branch died. `more()` tells whether the queue is still active.
    pub fn next(&mut self, rng: &mut ChaCha8Rng) -> Option<SegmentId> {
        let pending = self.queue.pop()?;
        let mut fork_distance = pending.fork_distance;

        let end = self.next_end(rng, pending.point, pending.heading, MAX_JITTER);
        let mut line = Line::new(pending.point, end);

        // skip if fully out of the world
        if !self.params.clip.contains(line.start) && !self.params.clip.contains(line.end) {
            return None;
        }

        let mut ends_at_water = false;

        if let Some((crossing, bank)) = self.terrain.water_crossing(&line) {
            if pending.kind == StreetKind::Local {
                // only highways may challenge water
                return None;
            }

            let dir = line.direction();
            if dir.cross(bank.direction()).abs() < NEAR_PARALLEL_LIMIT {
                // running almost parallel to the bank, not bridgeable
                return None;
            }

            if let Some(exit) = self.far_bank(crossing, dir) {
                // bridge across, landing a little past the far bank
                line.end = exit + dir * BRIDGE_OVERHANG;
            } else {
                // river too wide to bridge, the street ends at the bank
                line.end = crossing;
                ends_at_water = true;
            }
        }

        let id = SegmentId(self.grid.len() as u32);
        self.grid.insert(Segment {
            line,
            kind: pending.kind,
            connections: Vec::new(),
            ends_at_water,
        });

        if let Some(previous) = pending.previous {
            self.connect(id, previous);
        }

        if self.snap_to_endpoint(id) {
            // terminated by joining an existing street
            return Some(id);
        }

        if self.connect_at_intersection(id) {
            // terminated by crossing an existing street
            return Some(id);
        }

        if ends_at_water {
            return Some(id);
        }

        let segment_angle = self.grid.get(id.index()).angle();
        let segment_length = self.grid.get(id.index()).length();
        let segment_end = self.grid.get(id.index()).line.end;

        if pending.kind == StreetKind::Local
            && (self.density.sample(pending.point) < LOCAL_DENSITY_THRESHOLD
                || rng.gen_bool(LOCAL_DEATH_PROBABILITY))
        {
            // population not dense enough, stop here
            return Some(id);
        }

        if pending.kind == StreetKind::Highway {
            let density_trigger = pending.fork_distance > 350.0
                && self.density.sample(pending.point) > HIGHWAY_FORK_DENSITY;
            let random_trigger = pending.fork_distance > 500.0 && rng.gen_bool(0.01);

            if density_trigger || random_trigger {
                for sign in [1.0, -1.0] {
                    if rng.gen_bool(0.01) {
                        // fork a highway off at a right angle
                        self.push(PendingStreet {
                            previous: Some(id),
                            point: segment_end,
                            heading: segment_angle + std::f64::consts::FRAC_PI_2 * sign,
                            fork_distance: 0.0,
                            kind: StreetKind::Highway,
                            at_step: pending.at_step + 20,
                            seq: 0,
                        });

                        fork_distance = 0.0;
                    }
                }
            }
        }

        self.push(PendingStreet {
            previous: Some(id),
            point: segment_end,
            heading: segment_angle,
            fork_distance: fork_distance + segment_length,
            kind: pending.kind,
            at_step: pending.at_step + 10,
            seq: 0,
        });

        // in a high population neighbourhood, branch off a local street
        if self.density.sample(segment_end) > LOCAL_DENSITY_THRESHOLD && fork_distance > 100.0 {
            // local growth is deferred: a little for local parents, until the
            // highway network is exhausted for highway parents
            let at_step = match pending.kind {
                StreetKind::Highway => pending.at_step + 200_000,
                StreetKind::Local => pending.at_step + 200,
            };

            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

            self.push(PendingStreet {
                previous: Some(id),
                point: segment_end,
                heading: segment_angle + std::f64::consts::FRAC_PI_2 * sign,
                fork_distance: 0.0,
                kind: StreetKind::Local,
                at_step,
                seq: 0,
            });
        }

        Some(id)
    }

    /// Pick the end point for a new segment: sample a handful of jittered
    /// headings, look ahead along each at growing distances, and keep the
    /// heading whose look-ahead hits the densest population.
    fn next_end(&self, rng: &mut ChaCha8Rng, pos: Vec2, heading: f64, max_jitter: f64) -> Vec2 {
        let mut best = pos;
        let mut best_value = -1.0;

        for _ in 0..8 {
            let length = rng.gen_range(LENGTH_RANGE);
            let angle = heading + rng.gen_range(-max_jitter..max_jitter);
            let offset = Vec2::from_angle(angle) * length;

            for scale in 0..10 {
                let probe = pos + offset * (5.0 + 2.0 * scale as f64);
                let value = self.density.sample(probe);

                if value > best_value {
                    best_value = value;
                    best = pos + offset;
                }
            }
        }

        best
    }

    /// Walk the bridge probe along `dir` from the first crossing and return
    /// the farthest outline crossing within the span limit, i.e. the far
    /// bank. None if the river swallows the whole probe.
    fn far_bank(&self, crossing: Vec2, dir: Vec2) -> Option<Vec2> {
        let span_sq = MAX_BRIDGE_SPAN * MAX_BRIDGE_SPAN;
        let probe_end = crossing + dir * MAX_BRIDGE_SPAN;
        let mut cursor = crossing + dir * 1.0;
        let mut last = None;

        // the cursor advances at least one unit past every hit and the walk
        // stops once it leaves the span, keeping the probe finite even when
        // an outline edge sits right on the span boundary
        while cursor.distance_squared_to(crossing) < span_sq {
            match self.terrain.water_crossing(&Line::new(cursor, probe_end)) {
                Some((point, _)) => {
                    last = Some(point);
                    cursor = point + dir * 1.0;
                }
                None => break,
            }
        }

        last
    }

    fn connect(&mut self, a: SegmentId, b: SegmentId) {
        if !self.grid.get(a.index()).connected_to(b) {
            self.grid.get_mut(a.index()).connections.push(b);
        }
        if !self.grid.get(b.index()).connected_to(a) {
            self.grid.get_mut(b.index()).connections.push(a);
        }
    }

    /// Snap the free end of `id` onto a nearby existing endpoint. Returns
    /// true if the segment joined an existing street, terminating the branch.
    fn snap_to_endpoint(&mut self, id: SegmentId) -> bool {
        let end = self.grid.get(id.index()).line.end;
        let query = Rect::new(
            end - Vec2::splat(CONNECT_THRESHOLD),
            end + Vec2::splat(CONNECT_THRESHOLD),
        );

        let threshold_sq = CONNECT_THRESHOLD * CONNECT_THRESHOLD;

        for index in self.grid.candidates(&query) {
            // skip ourselves and the segment we grew from
            if index == id.index() || self.grid.get(id.index()).connected_to(SegmentId(index as u32)) {
                continue;
            }

            let other = self.grid.get(index).line;

            let snapped = if other.end.distance_squared_to(end) < threshold_sq {
                Some(other.end)
            } else if other.start.distance_squared_to(end) < threshold_sq {
                Some(other.start)
            } else {
                None
            };

            if let Some(point) = snapped {
                self.connect(id, SegmentId(index as u32));
                self.grid.get_mut(id.index()).line.end = point;
                self.grid.reindex(id.index());
                return true;
            }
        }

        false
    }

    /// Truncate `id` at the first crossing with an unconnected existing
    /// segment and connect the two. Returns true if a crossing was found.
    fn connect_at_intersection(&mut self, id: SegmentId) -> bool {
        let line = self.grid.get(id.index()).line;

        for index in self.grid.candidates(&line.bbox()) {
            if index == id.index() {
                continue;
            }

            let other_id = SegmentId(index as u32);
            if self.grid.get(id.index()).connected_to(other_id) {
                continue;
            }

            if let Some(point) = line.intersection(&self.grid.get(index).line) {
                self.connect(id, other_id);
                self.grid.get_mut(id.index()).line.end = point;
                self.grid.reindex(id.index());
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn generate(seed: u64, terrain: &Terrain) -> Vec<Segment> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut gen = StreetGenerator::new(&mut rng, StreetParams::default(), terrain);

        assert!(gen.seed_growth(&mut rng));
        gen.run_to_completion(&mut rng);

        gen.into_grid().items().to_vec()
    }

    #[test]
    fn test_pending_order_lowest_step_first() {
        let mut heap = BinaryHeap::new();

        for (at_step, seq) in [(30, 1), (10, 2), (10, 3), (20, 4)] {
            heap.push(PendingStreet {
                previous: None,
                point: Vec2::ZERO,
                heading: 0.0,
                fork_distance: 0.0,
                kind: StreetKind::Highway,
                at_step,
                seq,
            });
        }

        let order: Vec<(u64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|p| (p.at_step, p.seq))
            .collect();
        assert_eq!(order, vec![(10, 2), (10, 3), (20, 4), (30, 1)]);
    }

    #[test]
    fn test_growth_is_deterministic() {
        let terrain = Terrain::default();

        let a = generate(7, &terrain);
        let b = generate(7, &terrain);

        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.iter().zip(&b) {
            assert_eq!(sa.line.start, sb.line.start);
            assert_eq!(sa.line.end, sb.line.end);
            assert_eq!(sa.kind, sb.kind);
            assert_eq!(sa.connections, sb.connections);
        }
    }

    #[test]
    fn test_network_is_nonempty_and_connected_symmetrically() {
        let terrain = Terrain::default();
        let segments = generate(3, &terrain);

        assert!(segments.len() > 100, "only {} segments", segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let id = SegmentId(index as u32);
            for &other in &segment.connections {
                assert!(
                    segments[other.index()].connected_to(id),
                    "asymmetric connection {:?} -> {:?}",
                    id,
                    other
                );
            }
        }
    }

    #[test]
    fn test_segments_stay_near_clip() {
        let terrain = Terrain::default();
        let segments = generate(11, &terrain);

        // truncation and bridging may nudge endpoints a little past the clip
        // rect, but never further than one bridge span
        let margin = StreetParams::default().clip.expanded(MAX_BRIDGE_SPAN + 200.0);

        for segment in &segments {
            assert!(margin.contains(segment.line.start));
            assert!(margin.contains(segment.line.end));
        }
    }

    #[test]
    fn test_bridge_probe_stops_at_the_span_limit() {
        // bank edges straddling the span boundary: the probe must settle on
        // the last bank inside the span instead of walking forever
        let terrain = crate::terrain::water_strip(vec![
            Line::new(Vec2::new(400.0, -50.0), Vec2::new(400.0, 50.0)),
            Line::new(Vec2::new(799.5, -50.0), Vec2::new(799.5, 50.0)),
            Line::new(Vec2::new(800.3, -50.0), Vec2::new(800.3, 50.0)),
        ]);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let gen = StreetGenerator::new(&mut rng, StreetParams::default(), &terrain);

        let bank = gen.far_bank(Vec2::ZERO, Vec2::new(1.0, 0.0));
        match bank {
            Some(point) => assert!((point.x - 799.5).abs() < 1e-6, "bank at {:?}", point),
            None => panic!("no bank found inside the span"),
        }
    }

    #[test]
    fn test_local_streets_never_touch_water() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let world = StreetParams::default().clip;
        let mut terrain_gen = crate::terrain::TerrainGenerator::new(&mut rng, world);
        terrain_gen.generate_river(&mut rng);
        let terrain = terrain_gen.into_terrain();

        let mut gen = StreetGenerator::new(&mut rng, StreetParams::default(), &terrain);
        assert!(gen.seed_growth(&mut rng));
        gen.run_to_completion(&mut rng);

        for segment in gen.segments() {
            if segment.kind == StreetKind::Local {
                assert!(
                    terrain.water_crossing(&segment.line).is_none(),
                    "local street crosses a river"
                );
            }
        }
    }
}
