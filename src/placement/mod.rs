//! Collision-free placement of obstacle clusters

pub mod obb;
pub mod search;
pub mod world;

pub use obb::Obb;
pub use search::{
    FreeSpot, ItemOutcome, ItemReport, Orientation, PlacementItem, PlacementSearch, SearchConfig, SearchStep,
    SearchSummary,
};
pub use world::{BodyId, BoxBody, BoxWorld, Footprint, Instantiated, ItemFactory, LayerMask, PhysicsOracle};
