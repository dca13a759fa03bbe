//! Station graph and minimum spanning tree.
//!
//! Stations are referenced by index into the graph's station list. Edges are
//! undirected and priced by distance, rounded up to coarse tiers. The MST
//! engine extends a possibly non-empty graph to full connectivity at minimum
//! additional cost: edges already present are pre-unioned so an accepted
//! network is never broken, only extended.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use crate::stations::Station;

/// Money. One coin tier buys 100 units of track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coins(pub i64);

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}c", self.0)
    }
}

impl Add for Coins {
    type Output = Coins;

    fn add(self, rhs: Coins) -> Coins {
        Coins(self.0 + rhs.0)
    }
}

impl AddAssign for Coins {
    fn add_assign(&mut self, rhs: Coins) {
        self.0 += rhs.0;
    }
}

impl Sub for Coins {
    type Output = Coins;

    fn sub(self, rhs: Coins) -> Coins {
        Coins(self.0 - rhs.0)
    }
}

impl Sum for Coins {
    fn sum<I: Iterator<Item = Coins>>(iter: I) -> Coins {
        iter.fold(Coins(0), Add::add)
    }
}

/// Index of a station within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StationId(pub u32);

impl StationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An undirected connection between two stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationEdge {
    pub one: StationId,
    pub two: StationId,
}

impl StationEdge {
    pub fn new(one: StationId, two: StationId) -> Self {
        Self { one, two }
    }

    pub fn contains(&self, station: StationId) -> bool {
        self.one == station || self.two == station
    }

    pub fn is(&self, one: StationId, two: StationId) -> bool {
        (self.one == one && self.two == two) || (self.one == two && self.two == one)
    }

    /// The edge's other endpoint. Panics if `station` is not part of the
    /// edge; that is a caller bug, not a recoverable condition.
    pub fn other_station(&self, station: StationId) -> StationId {
        if self.one == station {
            self.two
        } else if self.two == station {
            self.one
        } else {
            panic!("station {:?} is not part of the edge", station)
        }
    }
}

/// Price of a track between two stations, in coarse distance tiers.
pub fn price_of(one: &Station, two: &Station) -> Coins {
    let distance = one.position.distance_to(two.position);
    Coins(((distance / 100.0).ceil() * 10.0) as i64)
}

/// Undirected graph over a fixed set of stations.
#[derive(Clone, Default)]
pub struct StationGraph {
    pub stations: Vec<Station>,
    edges: Vec<StationEdge>,
}

impl StationGraph {
    pub fn new(stations: Vec<Station>) -> Self {
        Self {
            stations,
            edges: Vec::new(),
        }
    }

    fn check_station(&self, station: StationId) {
        assert!(
            station.index() < self.stations.len(),
            "station {:?} is not part of the graph",
            station
        );
    }

    /// Insert an edge. Inserting an already present edge is a no-op; edges
    /// to stations outside the graph abort.
    pub fn insert(&mut self, edge: StationEdge) {
        self.check_station(edge.one);
        self.check_station(edge.two);

        if !self.has(edge.one, edge.two) {
            self.edges.push(edge);
        }
    }

    pub fn remove(&mut self, one: StationId, two: StationId) {
        self.edges.retain(|edge| !edge.is(one, two));
    }

    pub fn get(&self, one: StationId, two: StationId) -> Option<StationEdge> {
        self.edges.iter().copied().find(|edge| edge.is(one, two))
    }

    pub fn has(&self, one: StationId, two: StationId) -> bool {
        self.get(one, two).is_some()
    }

    pub fn edges(&self) -> &[StationEdge] {
        &self.edges
    }

    pub fn edges_of(&self, station: StationId) -> Vec<StationEdge> {
        self.check_station(station);
        self.edges
            .iter()
            .copied()
            .filter(|edge| edge.contains(station))
            .collect()
    }

    pub fn degree(&self, station: StationId) -> usize {
        self.check_station(station);
        self.edges
            .iter()
            .filter(|edge| edge.contains(station))
            .count()
    }

    pub fn has_connections(&self, station: StationId) -> bool {
        self.degree(station) > 0
    }

    pub fn price(&self, edge: StationEdge) -> Coins {
        price_of(
            &self.stations[edge.one.index()],
            &self.stations[edge.two.index()],
        )
    }

    pub fn total_price(&self) -> Coins {
        self.edges.iter().map(|&edge| self.price(edge)).sum()
    }
}

/// Disjoint sets over station indices, union by size with path halving.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(count: usize) -> Self {
        Self {
            parent: (0..count).collect(),
            size: vec![1; count],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    /// Merge the two sets. Returns false if they were already one.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);

        if root_a == root_b {
            return false;
        }

        if self.size[root_a] < self.size[root_b] {
            std::mem::swap(&mut root_a, &mut root_b);
        }

        self.parent[root_b] = root_a;
        self.size[root_a] += self.size[root_b];
        true
    }
}

/// Extend `input` to a minimum-cost fully connected graph.
///
/// Kruskal over the complete candidate edge set, with all of the input's
/// existing edges pre-unioned: the result equals the input plus the cheapest
/// edges required to connect everything, and the added edges never form a
/// cycle with each other or with the existing network.
pub fn build_mst(input: &StationGraph) -> StationGraph {
    let mut result = input.clone();
    let count = result.stations.len();

    let mut sets = UnionFind::new(count);

    // keep what is already built
    for edge in input.edges() {
        sets.union(edge.one.index(), edge.two.index());
    }

    let mut candidates = Vec::with_capacity(count * (count.max(1) - 1) / 2);
    for one in 0..count {
        for two in one + 1..count {
            let edge = StationEdge::new(StationId(one as u32), StationId(two as u32));
            candidates.push((result.price(edge), edge));
        }
    }

    // ascending by price, index pairs as a deterministic tie break
    candidates.sort_by_key(|&(price, edge)| (price, edge.one, edge.two));

    for (_, edge) in candidates {
        if sets.union(edge.one.index(), edge.two.index()) {
            result.insert(edge);
        }
    }

    result
}

/// True if every station is reachable from every other. Graphs with fewer
/// than two stations count as connected.
pub fn all_stations_connected(graph: &StationGraph) -> bool {
    let count = graph.stations.len();
    if count < 2 {
        return true;
    }

    let mut sets = UnionFind::new(count);
    let mut components = count;

    for edge in graph.edges() {
        if sets.union(edge.one.index(), edge.two.index()) {
            components -= 1;
        }
    }

    components == 1
}
