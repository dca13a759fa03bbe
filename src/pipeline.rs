//! Generation pipeline.
//!
//! Runs the full multi-stage generation for one seed: rivers, streets,
//! villages, stations and the minimum spanning tree, all driven by a single
//! random stream in a fixed stage order, so a seed always reproduces the
//! exact same world. The pipeline can run inline or as a background task
//! that reports coarse progress labels and is polled for its result.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::geom::{Rect, Vec2};
use crate::graph::{all_stations_connected, build_mst, Coins, StationGraph};
use crate::grid::SpatialGrid;
use crate::stations::{place_stations, Station};
use crate::streets::{Segment, StreetGenerator, StreetParams};
use crate::terrain::{Terrain, TerrainGenerator};
use crate::villages::{collect_villages, Village};

/// The player budget allows this much slack over the optimal network cost.
const BUDGET_FACTOR: f64 = 1.05;

/// Parameters for one generation run.
#[derive(Debug, Clone, Copy)]
pub struct WorldParams {
    pub seed: u64,
    pub world: Rect,
    /// Stations keep this distance from the world edge.
    pub clip_inset: f64,
    pub river_count: usize,
    /// Opposing highway growth-point pairs to start with.
    pub street_seeds: usize,
    /// Street generation work quantum for one scheduling slice.
    pub time_slice: Duration,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            seed: 0,
            world: Rect::new(Vec2::ZERO, Vec2::splat(32_000.0)),
            clip_inset: 1_500.0,
            river_count: 2,
            street_seeds: 1,
            time_slice: Duration::from_millis(12),
        }
    }
}

/// Immutable result snapshot of a finished generation run.
pub struct GeneratedWorld {
    pub params: WorldParams,
    pub terrain: Terrain,
    pub streets: SpatialGrid<Segment>,
    pub villages: Vec<Village>,
    pub stations: Vec<Station>,
    /// Cheapest graph connecting all stations.
    pub mst: StationGraph,
    /// Money the player gets to rebuild that graph.
    pub budget: Coins,
    /// Next random value after generation; equal runs produce equal values,
    /// so this doubles as a cheap reproducibility check.
    pub rng_check: u64,
}

impl GeneratedWorld {
    pub fn station_graph(&self) -> StationGraph {
        StationGraph::new(self.stations.clone())
    }

    pub fn all_stations_connectable(&self) -> bool {
        all_stations_connected(&self.mst)
    }
}

/// Run the full pipeline for `params`.
pub fn generate(params: WorldParams) -> GeneratedWorld {
    generate_with(params, |_| {})
}

/// Run the full pipeline, reporting a coarse progress label before each
/// stage. Stage order is fixed; all randomness comes from one stream seeded
/// with `params.seed`.
pub fn generate_with(params: WorldParams, mut progress: impl FnMut(&str)) -> GeneratedWorld {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    progress("Generating rivers");
    let mut terrain_gen = TerrainGenerator::new(&mut rng, params.world);
    for _ in 0..params.river_count {
        terrain_gen.generate_river(&mut rng);
    }
    let terrain = terrain_gen.into_terrain();

    progress("Growing street network");
    let street_params = StreetParams {
        clip: params.world,
        ..StreetParams::default()
    };
    let mut streets_gen = StreetGenerator::new(&mut rng, street_params, &terrain);
    for _ in 0..params.street_seeds {
        streets_gen.seed_growth(&mut rng);
    }

    while streets_gen.more() {
        streets_gen.run_for(&mut rng, params.time_slice);
        progress(&format!(
            "Growing street network ({} segments)",
            streets_gen.segments().len()
        ));
    }

    let streets = streets_gen.into_grid();

    progress("Collecting villages");
    let villages = collect_villages(&mut rng, &streets);

    progress("Placing stations");
    let clip = params.world.inset(params.clip_inset);
    let stations = place_stations(&mut rng, clip, &villages, &streets);

    progress("Calculating minimum spanning tree");
    let mst = build_mst(&StationGraph::new(stations.clone()));
    let budget = budget_for(mst.total_price());

    let rng_check = rng.gen();

    GeneratedWorld {
        params,
        terrain,
        streets,
        villages,
        stations,
        mst,
        budget,
        rng_check,
    }
}

/// Player budget: the optimal network cost plus 5% slack, rounded up to the
/// next coin tier.
fn budget_for(mst_total: Coins) -> Coins {
    Coins(((mst_total.0 as f64 * BUDGET_FACTOR / 10.0).ceil() * 10.0) as i64)
}

/// A generation run on a background thread. The host polls `progress` for
/// the current stage label and `try_take` for the finished world; there is
/// no cancellation, a started run always completes.
pub struct GenerationTask {
    progress: Arc<Mutex<String>>,
    handle: Option<JoinHandle<GeneratedWorld>>,
}

impl GenerationTask {
    pub fn spawn(params: WorldParams) -> Self {
        let progress = Arc::new(Mutex::new(String::from("Starting")));
        let worker_progress = Arc::clone(&progress);

        let handle = thread::spawn(move || {
            generate_with(params, |label| {
                if let Ok(mut slot) = worker_progress.lock() {
                    label.clone_into(&mut slot);
                }
            })
        });

        Self {
            progress,
            handle: Some(handle),
        }
    }

    /// Label of the stage the task is currently in.
    pub fn progress(&self) -> String {
        self.progress
            .lock()
            .map(|label| label.clone())
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Take the finished world, once. Returns None while the task is still
    /// running, and forever after the result has been taken.
    pub fn try_take(&mut self) -> Option<GeneratedWorld> {
        if self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            return self.handle.take().and_then(|handle| handle.join().ok());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streets::StreetKind;

    fn small_params(seed: u64) -> WorldParams {
        WorldParams {
            seed,
            world: Rect::new(Vec2::ZERO, Vec2::splat(12_000.0)),
            river_count: 1,
            ..WorldParams::default()
        }
    }

    #[test]
    fn test_same_seed_reproduces_the_world() {
        let a = generate(small_params(17));
        let b = generate(small_params(17));

        assert_eq!(a.rng_check, b.rng_check);
        assert_eq!(a.streets.len(), b.streets.len());
        assert_eq!(a.terrain.rivers.len(), b.terrain.rivers.len());
        assert_eq!(a.villages.len(), b.villages.len());
        assert_eq!(a.stations.len(), b.stations.len());
        assert_eq!(a.budget, b.budget);

        for (va, vb) in a.villages.iter().zip(&b.villages) {
            assert_eq!(va.name, vb.name);
            assert_eq!(va.population, vb.population);
        }
        for (sa, sb) in a.stations.iter().zip(&b.stations) {
            assert_eq!(sa.position, sb.position);
        }
    }

    #[test]
    fn test_generated_world_is_consistent() {
        let world = generate(small_params(3));

        assert!(!world.streets.is_empty());
        assert!(world.all_stations_connectable());
        assert!(world.budget >= world.mst.total_price());
        assert_eq!(world.budget.0 % 10, 0, "budget is priced in coin tiers");

        let clip = world.params.world.inset(world.params.clip_inset);
        for station in &world.stations {
            assert!(clip.contains(station.position));
            assert!(station.village < world.villages.len());
        }

        for segment in world.streets.items() {
            if segment.kind == StreetKind::Local {
                assert!(world.terrain.water_crossing(&segment.line).is_none());
            }
        }
    }

    #[test]
    fn test_full_size_world_grows_villages_stations_and_tree() {
        // the density landscape varies with the seed, so scan a few rather
        // than betting the scenario on a single noise layout
        let world = (1..=4)
            .map(|seed| {
                generate(WorldParams {
                    seed,
                    ..WorldParams::default()
                })
            })
            .find(|world| !world.stations.is_empty())
            .expect("no seed in 1..=4 grew a single station");

        assert!(world.villages.iter().any(|v| v.population >= 50));
        assert_eq!(world.mst.edges().len(), world.stations.len() - 1);
        assert!(world.all_stations_connectable());
        assert!(world.budget >= world.mst.total_price());

        // every village large enough inside the clip rect gets stations
        let clip = world.params.world.inset(world.params.clip_inset);
        for (index, village) in world.villages.iter().enumerate() {
            let clipped: Vec<_> = village
                .segments
                .iter()
                .filter(|id| clip.contains(world.streets.get(id.index()).line.midpoint()))
                .collect();
            let population: f64 = clipped
                .iter()
                .map(|id| {
                    world.streets.get(id.index()).length() / crate::villages::UNITS_PER_INHABITANT
                })
                .sum();

            if clipped.len() >= 10 && population.ceil() as usize >= 50 {
                assert!(
                    world.stations.iter().any(|s| s.village == index),
                    "village {} has no station",
                    village.name
                );
            }
        }
    }

    #[test]
    fn test_background_task_reports_progress_and_result() {
        let mut task = GenerationTask::spawn(small_params(5));

        let world = loop {
            if let Some(world) = task.try_take() {
                break world;
            }
            thread::sleep(Duration::from_millis(5));
        };

        assert!(!task.is_running());
        assert!(task.try_take().is_none(), "result must be taken only once");
        assert_eq!(world.rng_check, generate(small_params(5)).rng_check);
    }
}
