//! Single-threaded post-processing pipeline (C7-C10), run after
//! derivation candidates from all contact batches have been merged (§5).

pub mod conflict;
pub mod frequency;
pub mod loadbalance;
pub mod postwindow;
