//! Village clustering.
//!
//! Local streets are grouped into villages by flood fill: any two local
//! segments within a small distance belong to the same cluster. Clusters with
//! enough streets become named villages with a convex hull and a population
//! estimate derived from their total street length.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::geom::{convex_hull, Line, Rect, Vec2};
use crate::grid::SpatialGrid;
use crate::streets::{Segment, SegmentId, StreetKind};

/// Segments within this distance of a cluster member join the cluster.
const CLUSTER_DISTANCE: f64 = 100.0;

/// A cluster needs more than this many segments to count as a village.
const MIN_CLUSTER_SIZE: usize = 32;

/// One inhabitant per this many length-units of local street.
pub const UNITS_PER_INHABITANT: f64 = 100.0;

/// A cluster of local streets.
pub struct Village {
    pub id: usize,
    pub name: String,
    /// Convex hull over all member segment endpoints.
    pub hull: Vec<Vec2>,
    pub bbox: Rect,
    pub segments: Vec<SegmentId>,
    pub population: usize,
}

/// Cluster all local segments in `grid` into villages. Claiming order comes
/// from canonical grid-cell iteration, so results are reproducible for a
/// given street network and rng state.
pub fn collect_villages(rng: &mut ChaCha8Rng, grid: &SpatialGrid<Segment>) -> Vec<Village> {
    let mut names = shuffled_names(rng);

    // local segments in first-seen canonical cell order
    let mut order = Vec::new();
    let mut queued = vec![false; grid.len()];
    for (_, bucket) in grid.cells() {
        for &index in bucket {
            if !queued[index] && grid.get(index).kind == StreetKind::Local {
                queued[index] = true;
                order.push(index);
            }
        }
    }

    let mut claimed = vec![false; grid.len()];
    let mut remaining = order.len();
    let mut villages = Vec::new();
    let mut cursor = 0;

    while remaining > 1 {
        // first unclaimed segment starts the next village
        while cursor < order.len() && claimed[order[cursor]] {
            cursor += 1;
        }
        let Some(&seed) = order.get(cursor) else {
            break;
        };

        claimed[seed] = true;
        remaining -= 1;

        // grow the cluster breadth-first
        let mut cluster = vec![seed];
        let mut idx = 0;
        while idx < cluster.len() && remaining > 0 {
            let absorbed = extract_near(grid, &mut claimed, cluster[idx]);
            remaining -= absorbed.len();
            cluster.extend(absorbed);
            idx += 1;
        }

        let points = endpoints_of(grid, &cluster);
        let hull = convex_hull(&points);

        // only call it a village if we have some actual streets
        if cluster.len() > MIN_CLUSTER_SIZE && hull.len() >= 3 {
            let id = villages.len() + 1;
            let name = names
                .pop()
                .map(str::to_owned)
                .unwrap_or_else(|| format!("Village {}", id));

            villages.push(Village {
                id,
                name,
                bbox: Rect::bounding(&hull),
                hull,
                segments: cluster.iter().map(|&i| SegmentId(i as u32)).collect(),
                population: population_of(grid, &cluster),
            });
        }
    }

    villages
}

/// Claim and return all unclaimed local segments within the cluster distance
/// of `query`, in canonical grid order.
fn extract_near(grid: &SpatialGrid<Segment>, claimed: &mut [bool], query: usize) -> Vec<usize> {
    let query_line = grid.get(query).line;
    let bbox = query_line.bbox().expanded(CLUSTER_DISTANCE);

    let mut result = Vec::new();

    for index in grid.candidates(&bbox) {
        if claimed[index] || grid.get(index).kind != StreetKind::Local {
            continue;
        }

        if segment_distance(&query_line, &grid.get(index).line) <= CLUSTER_DISTANCE {
            claimed[index] = true;
            result.push(index);
        }
    }

    result
}

/// Minimum distance between the two segments' four endpoints.
fn segment_distance(a: &Line, b: &Line) -> f64 {
    [
        a.start.distance_to(b.start),
        a.start.distance_to(b.end),
        a.end.distance_to(b.start),
        a.end.distance_to(b.end),
    ]
    .into_iter()
    .fold(f64::MAX, f64::min)
}

fn endpoints_of(grid: &SpatialGrid<Segment>, cluster: &[usize]) -> Vec<Vec2> {
    let mut points = Vec::with_capacity(cluster.len() * 2);
    for &index in cluster {
        let line = grid.get(index).line;
        points.push(line.start);
        points.push(line.end);
    }
    points
}

/// One person for every 100 units of street length, rounded up.
fn population_of(grid: &SpatialGrid<Segment>, cluster: &[usize]) -> usize {
    let sum: f64 = cluster
        .iter()
        .map(|&index| grid.get(index).length() / UNITS_PER_INHABITANT)
        .sum();

    sum.ceil() as usize
}

fn shuffled_names(rng: &mut ChaCha8Rng) -> Vec<&'static str> {
    let mut names = NAMES.to_vec();
    names.shuffle(rng);
    names
}

const NAMES: [&str; 100] = [
    "Ashcombe",
    "Thistlewick",
    "Darnley Hollow",
    "Bramblehurst",
    "Eastonmere",
    "Cragfen",
    "Wetherby Down",
    "Millbridge",
    "Gorsefield",
    "Elmbourne",
    "Haverleigh",
    "Wychcombe",
    "Bramwith",
    "Netherfold",
    "Greystone End",
    "Withercombe",
    "Aldenbrook",
    "Mistlewick",
    "Fernley Cross",
    "Oakhollow",
    "Ravensmere",
    "Foxleigh",
    "Norham St. Giles",
    "Tillinghurst",
    "Windlecombe",
    "Marlow Fen",
    "Thackworth",
    "Hollowmere",
    "Birchcombe",
    "East Peverell",
    "Hogsden",
    "Ironleigh",
    "Crowmarsh",
    "Emberwick",
    "Wrenfold",
    "Sallowby",
    "Dunthorp",
    "Maplewick",
    "Brockhurst",
    "Coldmere",
    "Stagbourne",
    "Wynthorpe",
    "Farley-under-Wold",
    "Heathbury",
    "Caxton Hollow",
    "Faircombe",
    "Woolston Edge",
    "Redgrave Moor",
    "Bexhill Hollow",
    "Cobblebury",
    "Grindleford",
    "Foxcombe Vale",
    "Holloway End",
    "Piddlestone",
    "Winmarleigh",
    "Crowleigh",
    "Tunstowe",
    "Quenby Marsh",
    "Kestrelcombe",
    "Ormsden",
    "Branthorpe",
    "Wexley Heath",
    "Hobbington",
    "Elmstead Rise",
    "Dapplemere",
    "Nethercombe",
    "Broomley End",
    "Westering Hollow",
    "Felsham Vale",
    "Oxley Dene",
    "Yarrowby",
    "Cinderbourne",
    "Applefold",
    "Beechmarsh",
    "Norleigh",
    "Thornwick",
    "Linwell Hollow",
    "Peverstone",
    "Stonethorpe",
    "Witham Vale",
    "Cherriton",
    "Grayscombe",
    "Whitlow Hill",
    "Otterby Fen",
    "Willowham",
    "Gildersby",
    "Aldermere",
    "Brockleigh",
    "Redlinch",
    "Stowbeck",
    "Fallowford",
    "East Bransley",
    "Crickmarsh",
    "Harkwell",
    "Duncombe Green",
    "Kingsmere",
    "Swandale",
    "Farthinglow",
    "Moorwick",
    "Harrowell",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn local(x0: f64, y0: f64, x1: f64, y1: f64) -> Segment {
        Segment {
            line: Line::new(Vec2::new(x0, y0), Vec2::new(x1, y1)),
            kind: StreetKind::Local,
            connections: Vec::new(),
            ends_at_water: false,
        }
    }

    /// A 2D lattice of short local segments, all within cluster distance.
    fn lattice(origin: Vec2, cols: usize, rows: usize) -> Vec<Segment> {
        let mut segments = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                let x = origin.x + col as f64 * 60.0;
                let y = origin.y + row as f64 * 60.0;
                segments.push(local(x, y, x + 50.0, y));
            }
        }
        segments
    }

    #[test]
    fn test_two_separate_clusters_become_two_villages() {
        let mut segments = lattice(Vec2::new(0.0, 0.0), 7, 7);
        segments.extend(lattice(Vec2::new(10_000.0, 10_000.0), 7, 7));
        let grid = SpatialGrid::with_items(segments);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let villages = collect_villages(&mut rng, &grid);

        assert_eq!(villages.len(), 2);
        assert_ne!(villages[0].name, villages[1].name);
        assert_eq!(villages[0].id, 1);
        assert_eq!(villages[1].id, 2);

        for village in &villages {
            assert_eq!(village.segments.len(), 49);
            assert!(village.hull.len() >= 3);
        }
    }

    #[test]
    fn test_small_clusters_are_not_villages() {
        // 25 segments, below the 32 segment cutoff
        let grid = SpatialGrid::with_items(lattice(Vec2::ZERO, 5, 5));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(collect_villages(&mut rng, &grid).is_empty());
    }

    #[test]
    fn test_cluster_cutoff_needs_more_than_32_segments() {
        // exactly 32 segments is still below the cutoff
        let grid = SpatialGrid::with_items(lattice(Vec2::ZERO, 8, 4));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(collect_villages(&mut rng, &grid).is_empty());

        // one more segment within cluster distance tips it over
        let mut segments = lattice(Vec2::ZERO, 8, 4);
        segments.push(local(0.0, 240.0, 50.0, 240.0));
        let grid = SpatialGrid::with_items(segments);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let villages = collect_villages(&mut rng, &grid);
        assert_eq!(villages.len(), 1);
        assert_eq!(villages[0].segments.len(), 33);
    }

    #[test]
    fn test_highways_do_not_form_villages() {
        let mut segments = lattice(Vec2::ZERO, 7, 7);
        for segment in &mut segments {
            segment.kind = StreetKind::Highway;
        }
        let grid = SpatialGrid::with_items(segments);

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(collect_villages(&mut rng, &grid).is_empty());
    }

    #[test]
    fn test_population_counts_street_length() {
        // 49 segments of length 50 = 2450 units = 25 inhabitants
        let grid = SpatialGrid::with_items(lattice(Vec2::ZERO, 7, 7));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let villages = collect_villages(&mut rng, &grid);

        assert_eq!(villages.len(), 1);
        assert_eq!(villages[0].population, 25);
    }

    #[test]
    fn test_deterministic_for_same_rng_seed() {
        let mut segments = lattice(Vec2::ZERO, 8, 8);
        segments.extend(lattice(Vec2::new(20_000.0, 0.0), 8, 8));

        let run = |seed| {
            let grid = SpatialGrid::with_items(segments.clone());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            collect_villages(&mut rng, &grid)
                .into_iter()
                .map(|v| (v.name, v.population, v.hull))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(9), run(9));
    }
}
