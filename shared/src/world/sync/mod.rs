//! # Model synchronization
//!
//! Keeps two entity graphs of the same shape in step, in-process and without a wire.
//!
//! ## How a pair is mirrored
//! * **Signal ↔ Signal**: every fire on one side is fired on the other.
//! * **Property ↔ Property**: the side that already holds a value seeds the other, then changes
//!   flow both ways.
//! * **List / Set / Map**: element-wise, with entity elements deep cloned and mirrored
//!   recursively.
//! * **Model / Ext**: children are matched by name and mirrored pairwise; an extension that
//!   exists on one side only is created on the other.
//! * **Call / Endpoint**: nothing to pipe; they pass as long as both sides have one.
//!
//! A [`SyncGuard`](model_synchronizer::SyncGuard) per pair swallows the echo of a change that is
//! being copied, so the two sides never ping-pong.
//!
//! Mismatched kinds fail with [`SyncError::NotMutuallySynchronizable`](error::SyncError).

pub mod entity_view;
pub mod error;
pub mod model_synchronizer;
