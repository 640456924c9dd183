pub mod clean;
pub mod download;
pub mod engine;
pub mod mirror;
