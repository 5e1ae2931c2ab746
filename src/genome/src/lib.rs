//! Genomic coordinate primitives shared by every crate in this workspace.
//!
//! A [`Position`] is always interpreted relative to a [`ContigOrder`]: the table,
//! built once per shards-table file, that assigns each contig a small integer
//! rank in first-appearance order. Comparing positions is then an integer
//! compare on the hot path instead of a string compare.

pub mod contig_order;
pub use contig_order::ContigOrder;

pub mod position;
pub use position::{Position, PositionError};
