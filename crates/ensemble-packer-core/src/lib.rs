//! Candidate generation for 2D rectangle placement in a single fixed-size bin.
//!
//! - Engines: MaxRects (FF/BL/BSSF/BAF/BLSF/CP), Skyline (BL/MW + optional waste map)
//! - Corner points: `CornerPointsMr` ranks corner-anchored MaxRects placements by adjacency,
//!   `CornerPointsSl` lists every skyline resting position
//! - Ensemble: `EnsemblePacker` pools candidates from a roster and commits to all members
//!
//! The caller owns the choice: ask for candidates, pick one by any policy, commit it.
//!
//! Quick example:
//! ```
//! use ensemble_packer_core::prelude::*;
//! # fn main() -> ensemble_packer_core::Result<()> {
//! let cfg = PackerConfig::builder().with_bin(100, 100).build();
//! let mut ens = EnsemblePacker::from_config(&cfg)?;
//! let candidates = ens.get_candidates(10, 10)?;
//! ens.place_item(&candidates[0]);
//! assert_eq!(ens.rectangles().len(), 1);
//! # Ok(()) }
//! ```

pub mod config;
pub mod ensemble;
pub mod error;
pub mod export;
pub mod model;
pub mod packer;

pub use config::*;
pub use ensemble::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;

/// Convenience prelude for common types and functions.
/// Importing `ensemble_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::config::{
        EngineSpec, GuillotineChoice, MaxRectsHeuristic, PackerConfig, PackerConfigBuilder,
        SkylineHeuristic, default_roster,
    };
    pub use crate::ensemble::{EnsemblePacker, build_engine};
    pub use crate::error::{PackError, Result};
    pub use crate::model::{BinStats, Layout, Rect};
    pub use crate::packer::PackerEngine;
    pub use crate::packer::corner_points::{Adjacency, CornerPointsMr, CornerPointsSl};
    pub use crate::packer::maxrects::MaxRectsPacker;
    pub use crate::packer::skyline::SkylinePacker;
}
