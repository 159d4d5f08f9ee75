//! Candidate generators that return many placements instead of one.
//!
//! - [`CornerPointsMr`] anchors the item in all four corners of every fitting MaxRects free
//!   rectangle, keeps the candidates that touch the bin border or an already placed
//!   rectangle, and ranks them by how much of their perimeter is in contact.
//! - [`CornerPointsSl`] returns every resting position on a skyline, in both orientations.

use std::cmp::Ordering;

use tracing::trace;

use super::PackerEngine;
use super::maxrects::MaxRectsPacker;
use super::skyline::SkylinePacker;
use crate::config::{EngineSpec, MaxRectsHeuristic, SkylineHeuristic};
use crate::error::{PackError, Result, check_item};
use crate::model::{Rect, overlap_1d};

/// Contact between a candidate and its surroundings: touching edge length over perimeter.
///
/// Compared exactly (cross-multiplied), so equal ratios rank as ties.
#[derive(Debug, Clone, Copy)]
pub struct Adjacency {
    pub touching: u64,
    pub perimeter: u64,
}

impl Adjacency {
    /// Fraction of the perimeter in contact, in `[0, 1]`.
    pub fn score(&self) -> f64 {
        self.touching as f64 / self.perimeter as f64
    }
}

impl PartialEq for Adjacency {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Adjacency {}

impl PartialOrd for Adjacency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Adjacency {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.touching as u128 * other.perimeter as u128;
        let rhs = other.touching as u128 * self.perimeter as u128;
        lhs.cmp(&rhs)
    }
}

pub struct CornerPointsMr {
    name: String,
    inner: MaxRectsPacker,
    top_k: Option<usize>,
}

impl CornerPointsMr {
    /// `heuristic` only decides whether an orientation fits a free rectangle; ranking is by
    /// adjacency. `top_k` caps the number of returned candidates.
    pub fn new(
        width: u32,
        height: u32,
        allow_rotation: bool,
        heuristic: MaxRectsHeuristic,
        top_k: Option<usize>,
    ) -> Self {
        Self {
            name: EngineSpec::CornerPointsMr { heuristic, top_k }.label(),
            inner: MaxRectsPacker::new(width, height, allow_rotation, heuristic),
            top_k,
        }
    }

    pub fn top_k(&self) -> Option<usize> {
        self.top_k
    }

    /// The MaxRects engine whose free list drives candidate generation.
    pub fn inner(&self) -> &MaxRectsPacker {
        &self.inner
    }

    /// Four corner-anchored placements (lower-left, lower-right, upper-left, upper-right)
    /// per fitting free rectangle and orientation. Rotated placements come first; a square
    /// item is anchored twice when rotation is on.
    pub fn anchored_placements(&self, w: u32, h: u32) -> Vec<Rect> {
        let mut orientations: Vec<(u32, u32)> = Vec::with_capacity(2);
        if self.inner.allow_rotation() {
            orientations.push((h, w));
        }
        orientations.push((w, h));

        let mut out = Vec::new();
        for (ow, oh) in orientations {
            for m in self.inner.free_rects() {
                if self.inner.fitness(m, ow, oh).is_none() {
                    continue;
                }
                let (left, right) = (m.x, m.right() - ow);
                let (bottom, top) = (m.y, m.top() - oh);
                out.push(Rect::new(left, bottom, ow, oh));
                out.push(Rect::new(right, bottom, ow, oh));
                out.push(Rect::new(left, top, ow, oh));
                out.push(Rect::new(right, top, ow, oh));
            }
        }
        out
    }

    /// True if `c` sits flush in one of the four bin corners.
    pub fn is_corner_resident(&self, c: &Rect) -> bool {
        let (bw, bh) = (self.inner.bin_width(), self.inner.bin_height());
        let at_left = c.x == 0;
        let at_bottom = c.y == 0;
        let at_right = c.right() == bw;
        let at_top = c.top() == bh;
        (at_left || at_right) && (at_bottom || at_top)
    }

    /// True if some placed rectangle shares a stretch of positive length with an edge of `c`.
    pub fn touches_placed(&self, c: &Rect) -> bool {
        self.inner
            .rectangles()
            .iter()
            .any(|r| touching_length(c, r) > 0)
    }

    /// Edge contact of `c` with placed rectangles and with the bin boundary.
    pub fn adjacency(&self, c: &Rect) -> Adjacency {
        adjacency_in(
            self.inner.bin_width(),
            self.inner.bin_height(),
            self.inner.rectangles(),
            c,
        )
    }

    /// Fraction of `c`'s perimeter touching placed rectangles or the bin boundary.
    pub fn adjacency_score(&self, c: &Rect) -> f64 {
        self.adjacency(c).score()
    }

    /// Drops candidates that touch nothing, then orders the rest by descending adjacency.
    /// The sort is stable and the result is cut to `top_k` when set.
    pub fn rank(&self, candidates: Vec<Rect>) -> Vec<Rect> {
        let mut scored: Vec<(Rect, Adjacency)> = candidates
            .into_iter()
            .filter(|c| self.is_corner_resident(c) || self.touches_placed(c))
            .map(|c| (c, self.adjacency(&c)))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        if let Some(k) = self.top_k {
            scored.truncate(k);
        }
        scored.into_iter().map(|(c, _)| c).collect()
    }
}

/// Edge contact of `c` inside a `bin_w x bin_h` bin holding `placed`.
///
/// Every placed neighbour contributes its own shared length; an edge lying on the bin
/// boundary counts in full regardless of neighbours.
pub fn adjacency_in(bin_w: u32, bin_h: u32, placed: &[Rect], c: &Rect) -> Adjacency {
    let mut touching: u64 = placed.iter().map(|r| touching_length(c, r)).sum();
    if c.x == 0 {
        touching += c.h as u64;
    }
    if c.y == 0 {
        touching += c.w as u64;
    }
    if c.top() == bin_h {
        touching += c.w as u64;
    }
    if c.right() == bin_w {
        touching += c.h as u64;
    }
    Adjacency {
        touching,
        perimeter: c.perimeter(),
    }
}

/// Length of the boundary shared by `c` and `r` across each of `c`'s four edges.
/// Zero unless they touch exactly with overlapping projections.
fn touching_length(c: &Rect, r: &Rect) -> u64 {
    let mut len = 0u64;
    let y_overlap = || overlap_1d(c.y, c.top(), r.y, r.top()) as u64;
    let x_overlap = || overlap_1d(c.x, c.right(), r.x, r.right()) as u64;
    // r on the left
    if r.right() == c.x && r.y < c.top() && r.top() > c.y {
        len += y_overlap();
    }
    // r on the right
    if r.x == c.right() && r.y < c.top() && r.top() > c.y {
        len += y_overlap();
    }
    // r below
    if r.top() == c.y && r.x < c.right() && r.right() > c.x {
        len += x_overlap();
    }
    // r above
    if r.y == c.top() && r.x < c.right() && r.right() > c.x {
        len += x_overlap();
    }
    len
}

impl PackerEngine for CornerPointsMr {
    fn name(&self) -> &str {
        &self.name
    }
    fn bin_width(&self) -> u32 {
        self.inner.bin_width()
    }
    fn bin_height(&self) -> u32 {
        self.inner.bin_height()
    }
    fn allow_rotation(&self) -> bool {
        self.inner.allow_rotation()
    }

    fn select_best_position(&self, width: u32, height: u32) -> Result<Vec<Rect>> {
        check_item(width, height)?;
        if self.inner.free_rects().is_empty() {
            return Ok(Vec::new());
        }
        let anchored = self.anchored_placements(width, height);
        let generated = anchored.len();
        let ranked = self.rank(anchored);
        trace!(
            engine = %self.name,
            generated,
            kept = ranked.len(),
            "corner candidates"
        );
        Ok(ranked)
    }

    fn place_rect(&mut self, width: u32, height: u32, x: u32, y: u32) {
        self.inner.place_rect(width, height, x, y);
    }

    fn rectangles(&self) -> &[Rect] {
        self.inner.rectangles()
    }
}

pub struct CornerPointsSl {
    name: String,
    inner: SkylinePacker,
}

impl CornerPointsSl {
    pub fn new(width: u32, height: u32, allow_rotation: bool) -> Self {
        Self::from_skyline(SkylinePacker::new(
            width,
            height,
            allow_rotation,
            SkylineHeuristic::BottomLeft,
        ))
    }

    /// Wraps an existing skyline. Queries fail if it has a waste map.
    pub fn from_skyline(inner: SkylinePacker) -> Self {
        Self {
            name: EngineSpec::CornerPointsSl.label(),
            inner,
        }
    }

    pub fn inner(&self) -> &SkylinePacker {
        &self.inner
    }
}

impl PackerEngine for CornerPointsSl {
    fn name(&self) -> &str {
        &self.name
    }
    fn bin_width(&self) -> u32 {
        self.inner.bin_width()
    }
    fn bin_height(&self) -> u32 {
        self.inner.bin_height()
    }
    fn allow_rotation(&self) -> bool {
        self.inner.allow_rotation()
    }

    fn select_best_position(&self, width: u32, height: u32) -> Result<Vec<Rect>> {
        check_item(width, height)?;
        if self.inner.has_waste_map() {
            return Err(PackError::UnsupportedConfiguration(
                "corner-point skyline cannot drive a skyline with a waste map: \
                 waste-map placements are not part of the skyline profile"
                    .into(),
            ));
        }
        let longest = self.bin_width().max(self.bin_height());
        if width > longest || height > longest {
            return Ok(Vec::new());
        }
        let mut placements = self.inner.generate_placements(width, height);
        if self.allow_rotation() && width != height {
            placements.extend(self.inner.generate_placements(height, width));
        }
        trace!(engine = %self.name, count = placements.len(), "skyline placements");
        Ok(placements)
    }

    fn place_rect(&mut self, width: u32, height: u32, x: u32, y: u32) {
        self.inner.place_rect(width, height, x, y);
    }

    fn rectangles(&self) -> &[Rect] {
        self.inner.rectangles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuillotineChoice;

    #[test]
    fn empty_bin_yields_the_four_bin_corners() {
        let cp = CornerPointsMr::new(100, 100, false, MaxRectsHeuristic::FirstFit, None);
        let anchored = cp.anchored_placements(10, 10);
        assert_eq!(
            anchored,
            vec![
                Rect::new(0, 0, 10, 10),
                Rect::new(90, 0, 10, 10),
                Rect::new(0, 90, 10, 10),
                Rect::new(90, 90, 10, 10),
            ]
        );
        let ranked = cp.select_best_position(10, 10).unwrap();
        assert_eq!(ranked, anchored);
        for c in &ranked {
            assert!(cp.is_corner_resident(c));
            assert_eq!(cp.adjacency_score(c), 0.5);
        }
    }

    #[test]
    fn rotated_orientation_comes_first() {
        let cp = CornerPointsMr::new(100, 100, true, MaxRectsHeuristic::FirstFit, None);
        let anchored = cp.anchored_placements(10, 20);
        assert_eq!(anchored.len(), 8);
        assert!(anchored[..4].iter().all(|r| (r.w, r.h) == (20, 10)));
        assert!(anchored[4..].iter().all(|r| (r.w, r.h) == (10, 20)));
    }

    #[test]
    fn square_item_is_anchored_in_both_orientations() {
        let cp = CornerPointsMr::new(100, 100, true, MaxRectsHeuristic::FirstFit, None);
        let anchored = cp.anchored_placements(10, 10);
        assert_eq!(anchored.len(), 8);
        assert_eq!(anchored[..4], anchored[4..]);
        let ranked = cp.select_best_position(10, 10).unwrap();
        assert_eq!(ranked, anchored);
    }

    #[test]
    fn full_bin_item_scores_one() {
        let cp = CornerPointsMr::new(40, 30, false, MaxRectsHeuristic::BestAreaFit, None);
        let c = Rect::new(0, 0, 40, 30);
        assert_eq!(cp.adjacency_score(&c), 1.0);
    }

    #[test]
    fn floating_candidate_is_rejected() {
        let mut cp = CornerPointsMr::new(100, 100, false, MaxRectsHeuristic::FirstFit, None);
        cp.place_rect(10, 10, 0, 0);
        assert!(!cp.touches_placed(&Rect::new(50, 50, 10, 10)));
        assert!(!cp.is_corner_resident(&Rect::new(50, 50, 10, 10)));
        // corner contact only, no shared edge length
        assert!(!cp.touches_placed(&Rect::new(10, 10, 5, 5)));
        assert!(cp.touches_placed(&Rect::new(10, 5, 5, 5)));
        assert!(cp.touches_placed(&Rect::new(5, 10, 5, 5)));
    }

    #[test]
    fn neighbours_on_one_edge_add_up() {
        let mut cp = CornerPointsMr::new(100, 100, false, MaxRectsHeuristic::FirstFit, None);
        cp.place_rect(10, 10, 0, 20);
        cp.place_rect(10, 10, 0, 30);
        let c = Rect::new(10, 25, 10, 10);
        // 5 from each neighbour on the left edge
        assert_eq!(cp.adjacency(&c).touching, 10);
        assert_eq!(cp.adjacency_score(&c), 0.25);
    }

    #[test]
    fn ranking_prefers_snug_corners_and_keeps_ties_in_order() {
        let mut cp = CornerPointsMr::new(100, 100, false, MaxRectsHeuristic::FirstFit, None);
        cp.place_rect(30, 30, 0, 0);
        let ranked = cp.select_best_position(10, 10).unwrap();
        // snug against the placed block and the bin bottom
        assert_eq!(ranked[0], Rect::new(30, 0, 10, 10));
        let scores: Vec<f64> = ranked.iter().map(|c| cp.adjacency_score(c)).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn top_k_truncates() {
        let cp = CornerPointsMr::new(100, 100, true, MaxRectsHeuristic::FirstFit, Some(2));
        let ranked = cp.select_best_position(10, 20).unwrap();
        assert_eq!(ranked.len(), 2);
        // first two rotated corners
        assert_eq!(ranked, vec![Rect::new(0, 0, 20, 10), Rect::new(80, 0, 20, 10)]);
    }

    #[test]
    fn adjacency_order_is_exact() {
        let a = Adjacency {
            touching: 1,
            perimeter: 3,
        };
        let b = Adjacency {
            touching: 2,
            perimeter: 6,
        };
        assert_eq!(a, b);
        assert!(
            Adjacency {
                touching: 2,
                perimeter: 5
            } > a
        );
    }

    #[test]
    fn skyline_adapter_returns_every_resting_place() {
        let mut sl = CornerPointsSl::new(100, 100, true);
        sl.place_rect(40, 50, 0, 0);
        let got = sl.select_best_position(10, 20).unwrap();
        let upright = sl.inner().generate_placements(10, 20);
        let flat = sl.inner().generate_placements(20, 10);
        assert_eq!(got.len(), upright.len() + flat.len());
        assert_eq!(&got[..upright.len()], upright.as_slice());
        assert_eq!(&got[upright.len()..], flat.as_slice());
    }

    #[test]
    fn skyline_adapter_rejects_oversize_cheaply() {
        let sl = CornerPointsSl::new(100, 50, true);
        assert!(sl.select_best_position(101, 1).unwrap().is_empty());
        // fits only rotated
        assert!(!sl.select_best_position(10, 80).unwrap().is_empty());
    }

    #[test]
    fn skyline_adapter_refuses_waste_map() {
        let inner = SkylinePacker::new(100, 100, true, SkylineHeuristic::BottomLeft)
            .with_waste_map(GuillotineChoice::BestAreaFit);
        let sl = CornerPointsSl::from_skyline(inner);
        assert!(matches!(
            sl.select_best_position(10, 10),
            Err(PackError::UnsupportedConfiguration(_))
        ));
    }
}
