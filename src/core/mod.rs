//! # Core Abstractions
//!
//! The hardware-independent vocabulary of the dispatcher:
//!
//! - **[`region`]:** the closed region enumeration and the sequencing
//!   state machine that splits one operator application into phases.
//! - **[`context`]:** per-call configuration and the immutable per-phase
//!   contexts derived from it.
//! - **[`geometry`]:** field shape/precision metadata and the field
//!   collaborator trait.
//! - **[`cost`]:** pure flop/byte accounting per region.

pub mod context;
pub mod cost;
pub mod geometry;
pub mod region;
