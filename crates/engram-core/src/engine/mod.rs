// Engram engine: stateful components built on the atoms layer.

pub mod config;
pub mod engram;
