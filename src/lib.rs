pub mod builder;
pub mod constants;
pub mod engine;
pub mod ghosts;
pub mod history;
pub mod map;
pub mod rng;
pub mod state;
pub mod types;
pub mod visibility;
