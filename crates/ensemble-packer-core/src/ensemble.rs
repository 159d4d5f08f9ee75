use std::collections::HashSet;

use tracing::{debug, instrument, trace};

use crate::config::{EngineSpec, PackerConfig};
use crate::error::{PackError, Result};
use crate::model::{BinStats, Layout, Rect};
use crate::packer::PackerEngine;
use crate::packer::corner_points::{CornerPointsMr, CornerPointsSl};
use crate::packer::maxrects::MaxRectsPacker;
use crate::packer::skyline::SkylinePacker;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Builds one roster member for a `width x height` bin.
pub fn build_engine(
    spec: &EngineSpec,
    width: u32,
    height: u32,
    allow_rotation: bool,
) -> Box<dyn PackerEngine> {
    match spec {
        EngineSpec::MaxRects { heuristic } => Box::new(MaxRectsPacker::new(
            width,
            height,
            allow_rotation,
            *heuristic,
        )),
        EngineSpec::Skyline {
            heuristic,
            use_waste_map,
            g_choice,
        } => {
            let sky = SkylinePacker::new(width, height, allow_rotation, *heuristic);
            if *use_waste_map {
                Box::new(sky.with_waste_map(*g_choice))
            } else {
                Box::new(sky)
            }
        }
        EngineSpec::CornerPointsMr { heuristic, top_k } => Box::new(CornerPointsMr::new(
            width,
            height,
            allow_rotation,
            *heuristic,
            *top_k,
        )),
        EngineSpec::CornerPointsSl => {
            Box::new(CornerPointsSl::new(width, height, allow_rotation))
        }
    }
}

/// A fixed roster of engines over the same bin, queried together and committed together.
///
/// Every member sees every commit, so all of them describe the same occupied geometry even
/// though their free-space bookkeeping differs. The first member's placed list is the
/// canonical view.
pub struct EnsemblePacker {
    width: u32,
    height: u32,
    allow_rotation: bool,
    parallel: bool,
    roster: Vec<Box<dyn PackerEngine>>,
}

impl EnsemblePacker {
    /// Builds the roster described by `cfg`.
    #[instrument(skip_all)]
    pub fn from_config(cfg: &PackerConfig) -> Result<Self> {
        cfg.validate()?;
        let roster = cfg
            .roster
            .iter()
            .map(|spec| build_engine(spec, cfg.bin_width, cfg.bin_height, cfg.allow_rotation))
            .collect();
        let mut ensemble =
            Self::with_roster(cfg.bin_width, cfg.bin_height, cfg.allow_rotation, roster)?;
        ensemble.parallel = cfg.parallel;
        debug!(
            members = ensemble.roster.len(),
            width = cfg.bin_width,
            height = cfg.bin_height,
            "ensemble ready"
        );
        Ok(ensemble)
    }

    /// Wraps hand-built engines. All of them must share the bin size and rotation policy.
    pub fn with_roster(
        width: u32,
        height: u32,
        allow_rotation: bool,
        roster: Vec<Box<dyn PackerEngine>>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PackError::InvalidDimension { width, height });
        }
        if roster.is_empty() {
            return Err(PackError::InvalidConfig(
                "roster must contain at least one engine".into(),
            ));
        }
        for engine in &roster {
            if engine.bin_width() != width || engine.bin_height() != height {
                return Err(PackError::InvalidConfig(format!(
                    "{}: bin is {}x{}, expected {}x{}",
                    engine.name(),
                    engine.bin_width(),
                    engine.bin_height(),
                    width,
                    height
                )));
            }
            if engine.allow_rotation() != allow_rotation {
                return Err(PackError::InvalidConfig(format!(
                    "{}: rotation policy differs from the ensemble",
                    engine.name()
                )));
            }
            if !engine.rectangles().is_empty() {
                return Err(PackError::InvalidConfig(format!(
                    "{}: engine already holds placements",
                    engine.name()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            allow_rotation,
            parallel: false,
            roster,
        })
    }

    /// Query members on the rayon pool (needs the "parallel" feature).
    pub fn with_parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn allow_rotation(&self) -> bool {
        self.allow_rotation
    }

    pub fn roster(&self) -> impl Iterator<Item = &dyn PackerEngine> {
        self.roster.iter().map(|e| e.as_ref())
    }

    pub fn roster_names(&self) -> Vec<&str> {
        self.roster.iter().map(|e| e.name()).collect()
    }

    /// Number of roster members.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Always false for a constructed ensemble; the roster is never empty.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Every member's candidates, concatenated in roster order, duplicates kept.
    fn pooled(&self, width: u32, height: u32) -> Result<Vec<Rect>> {
        #[cfg(feature = "parallel")]
        if self.parallel {
            let per_engine: Vec<Result<Vec<Rect>>> = self
                .roster
                .par_iter()
                .map(|e| e.select_best_position(width, height))
                .collect();
            let mut pooled = Vec::new();
            for (engine, r) in self.roster.iter().zip(per_engine) {
                let found = r?;
                trace!(engine = engine.name(), count = found.len(), "member candidates");
                pooled.extend(found);
            }
            return Ok(pooled);
        }

        let mut pooled = Vec::new();
        for engine in &self.roster {
            let found = engine.select_best_position(width, height)?;
            trace!(engine = engine.name(), count = found.len(), "member candidates");
            pooled.extend(found);
        }
        Ok(pooled)
    }

    /// Distinct candidate placements for a `width x height` item from all members.
    ///
    /// Empty when no member can place the item. The order follows first appearance in
    /// roster order but callers should treat the result as a set.
    #[instrument(skip(self))]
    pub fn get_candidates(&self, width: u32, height: u32) -> Result<Vec<Rect>> {
        let pooled = self.pooled(width, height)?;
        let total = pooled.len();
        let mut seen: HashSet<Rect> = HashSet::with_capacity(total);
        let unique: Vec<Rect> = pooled.into_iter().filter(|r| seen.insert(*r)).collect();
        debug!(total, unique = unique.len(), "pooled candidates");
        Ok(unique)
    }

    /// The candidate at flat position `index` of the roster-order concatenation,
    /// before deduplication.
    pub fn get_candidate_at(&self, width: u32, height: u32, index: usize) -> Result<Rect> {
        let pooled = self.pooled(width, height)?;
        pooled
            .get(index)
            .copied()
            .ok_or(PackError::CandidateIndexOutOfRange {
                index,
                len: pooled.len(),
            })
    }

    /// Commits `rect` on every member, in roster order.
    ///
    /// `rect` must be in bounds and disjoint from earlier placements, which holds for
    /// anything returned by `get_candidates` since the last commit.
    #[instrument(skip(self))]
    pub fn place_item(&mut self, rect: &Rect) {
        for engine in self.roster.iter_mut() {
            engine.place_rect(rect.w, rect.h, rect.x, rect.y);
        }
        debug!(placed = self.rectangles().len(), "committed");
    }

    /// Committed rectangles in commit order.
    pub fn rectangles(&self) -> &[Rect] {
        self.roster[0].rectangles()
    }

    pub fn stats(&self) -> BinStats {
        BinStats::from_rects(self.width, self.height, self.rectangles())
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.width, self.height, self.rectangles().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaxRectsHeuristic, SkylineHeuristic};

    fn small_roster() -> PackerConfig {
        PackerConfig::builder()
            .with_bin(100, 100)
            .roster(vec![
                EngineSpec::MaxRects {
                    heuristic: MaxRectsHeuristic::BestShortSideFit,
                },
                EngineSpec::CornerPointsMr {
                    heuristic: MaxRectsHeuristic::FirstFit,
                    top_k: None,
                },
            ])
            .build()
    }

    #[test]
    fn candidates_are_deduplicated() {
        let ens = EnsemblePacker::from_config(&small_roster()).unwrap();
        let got = ens.get_candidates(10, 10).unwrap();
        // (0,0) comes from both members
        assert_eq!(got.len(), 4);
        assert_eq!(got[0], Rect::new(0, 0, 10, 10));
        assert_eq!(ens.get_candidate_at(10, 10, 1).unwrap(), Rect::new(0, 0, 10, 10));
        // the square is anchored once per orientation before dedup
        assert_eq!(ens.get_candidate_at(10, 10, 5).unwrap(), Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn index_out_of_range_is_reported() {
        let ens = EnsemblePacker::from_config(&small_roster()).unwrap();
        match ens.get_candidate_at(10, 10, 9) {
            Err(PackError::CandidateIndexOutOfRange { index, len }) => {
                assert_eq!(index, 9);
                assert_eq!(len, 9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mismatched_member_is_rejected() {
        let roster: Vec<Box<dyn PackerEngine>> = vec![
            Box::new(MaxRectsPacker::new(100, 100, true, MaxRectsHeuristic::BestAreaFit)),
            Box::new(SkylinePacker::new(100, 90, true, SkylineHeuristic::BottomLeft)),
        ];
        assert!(matches!(
            EnsemblePacker::with_roster(100, 100, true, roster),
            Err(PackError::InvalidConfig(_))
        ));
        let roster: Vec<Box<dyn PackerEngine>> = vec![Box::new(MaxRectsPacker::new(
            100,
            100,
            false,
            MaxRectsHeuristic::BestAreaFit,
        ))];
        assert!(EnsemblePacker::with_roster(100, 100, true, roster).is_err());
    }

    #[test]
    fn empty_roster_is_rejected() {
        assert!(EnsemblePacker::with_roster(10, 10, true, Vec::new()).is_err());
    }
}
