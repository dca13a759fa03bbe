//! Transportation-puzzle world generation library
//!
//! Re-exports modules for use by the CLI binary and host game layers.

pub mod density;
pub mod export;
pub mod geom;
pub mod graph;
pub mod grid;
pub mod pipeline;
pub mod stations;
pub mod streets;
pub mod terrain;
pub mod villages;

pub use geom::{Line, Rect, Vec2};
pub use graph::{Coins, StationGraph, StationId, build_mst};
pub use pipeline::{GeneratedWorld, GenerationTask, WorldParams, generate};
