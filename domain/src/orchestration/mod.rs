//! Orchestration domain: model turns, rounds, and turn phases.

pub mod entities;
