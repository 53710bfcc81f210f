//! Robots.txt handling module
//!
//! This module provides fetching, parsing, and per-origin caching of robots.txt
//! files, exposed through [`RobotsGate`].

mod cache;
mod parser;

pub use cache::RobotsGate;
pub use parser::ParsedRobots;
