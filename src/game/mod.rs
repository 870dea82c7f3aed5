pub mod arena;
pub mod constants;
pub mod geometry;
pub mod input;
pub mod partition;
pub mod types;
