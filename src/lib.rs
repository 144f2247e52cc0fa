//! Evolves scripts of game actions with a genetic algorithm until one of them
//! carries the player to a destination position.

pub mod action;
pub mod config;
pub mod driver;
pub mod evolution;
pub mod export;
