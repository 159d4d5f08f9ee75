use super::PackerEngine;
use crate::config::{EngineSpec, MaxRectsHeuristic};
use crate::error::{Result, check_item};
use crate::model::{Rect, overlap_1d};

pub struct MaxRectsPacker {
    name: String,
    bin: Rect,
    allow_rotation: bool,
    free: Vec<Rect>,
    used: Vec<Rect>,
    heuristic: MaxRectsHeuristic,
}

impl MaxRectsPacker {
    pub fn new(width: u32, height: u32, allow_rotation: bool, heuristic: MaxRectsHeuristic) -> Self {
        let bin = Rect::new(0, 0, width, height);
        Self {
            name: EngineSpec::MaxRects { heuristic }.label(),
            bin,
            free: if width > 0 && height > 0 { vec![bin] } else { Vec::new() },
            used: Vec::new(),
            allow_rotation,
            heuristic,
        }
    }

    /// Current maximal free rectangles. Every one of them is empty and none contains another.
    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }

    pub fn heuristic(&self) -> MaxRectsHeuristic {
        self.heuristic
    }

    /// Scores a `w x h` item anchored at the lower-left corner of free rectangle `fr`.
    ///
    /// Lower is better; `None` means the item does not fit `fr`.
    pub fn fitness(&self, fr: &Rect, w: u32, h: u32) -> Option<(i64, i64)> {
        if !fr.fits(w, h) {
            return None;
        }
        let leftover_h = fr.w as i64 - w as i64;
        let leftover_v = fr.h as i64 - h as i64;
        let short_fit = leftover_h.min(leftover_v);
        let long_fit = leftover_h.max(leftover_v);
        let area_fit = fr.area() as i64 - (w as i64 * h as i64);
        Some(match self.heuristic {
            MaxRectsHeuristic::FirstFit => (0, 0),
            MaxRectsHeuristic::BottomLeft => (fr.y as i64 + h as i64, fr.x as i64),
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::ContactPoint => {
                // maximize contact score: use negative for minimization
                let contact = self.contact_point_score(&Rect::new(fr.x, fr.y, w, h));
                (-(contact as i64), area_fit)
            }
        })
    }

    fn find_position(&self, w: u32, h: u32) -> Option<Rect> {
        // (score1, score2, top, left); the last two keep ties deterministic
        let mut best: Option<((i64, i64, u32, u32), Rect)> = None;
        let mut consider = |fr: &Rect, w: u32, h: u32| {
            if let Some((s1, s2)) = self.fitness(fr, w, h) {
                let key = (s1, s2, fr.y + h, fr.x);
                if best.as_ref().is_none_or(|(b, _)| key < *b) {
                    best = Some((key, Rect::new(fr.x, fr.y, w, h)));
                }
            }
        };
        for fr in &self.free {
            consider(fr, w, h);
            if self.allow_rotation && w != h {
                consider(fr, h, w);
            }
        }
        best.map(|(_, r)| r)
    }

    fn contact_point_score(&self, node: &Rect) -> u64 {
        let mut score = 0u64;
        // contact with bin edges
        if node.x == 0 {
            score += node.h as u64;
        }
        if node.y == 0 {
            score += node.w as u64;
        }
        if node.right() == self.bin.right() {
            score += node.h as u64;
        }
        if node.top() == self.bin.top() {
            score += node.w as u64;
        }
        // contact with used rectangles
        for u in &self.used {
            if node.x == u.right() || u.x == node.right() {
                score += overlap_1d(node.y, node.top(), u.y, u.top()) as u64;
            }
            if node.y == u.top() || u.y == node.top() {
                score += overlap_1d(node.x, node.right(), u.x, u.right()) as u64;
            }
        }
        score
    }

    fn split_free(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::new();
        let mut i = 0usize;
        while i < self.free.len() {
            let fr = self.free[i];
            if fr.intersects(node) {
                // remove this free rect; split into parts added to new_free
                self.free.swap_remove(i);
                split_free_node(fr, node, &mut new_free);
            } else {
                i += 1;
            }
        }
        self.prune_new_vs_old(&mut new_free);
        prune_within(&mut new_free);
        self.free.extend(new_free);
    }

    fn prune_new_vs_old(&mut self, new_free: &mut Vec<Rect>) {
        // Remove any new rect fully contained in any existing free rect
        new_free.retain(|nr| nr.w > 0 && nr.h > 0 && !self.free.iter().any(|of| of.contains(nr)));
        // Remove any existing free rect fully contained in any remaining new rect
        let mut i = 0;
        while i < self.free.len() {
            if new_free.iter().any(|nr| nr.contains(&self.free[i])) {
                self.free.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}

/// Splits `fr` around `node` into up to four maximal strips.
fn split_free_node(fr: Rect, node: &Rect, out: &mut Vec<Rect>) {
    // Left
    if node.x > fr.x {
        out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
    }
    // Right
    if node.right() < fr.right() {
        out.push(Rect::new(node.right(), fr.y, fr.right() - node.right(), fr.h));
    }
    // Below
    if node.y > fr.y {
        out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
    }
    // Above
    if node.top() < fr.top() {
        out.push(Rect::new(fr.x, node.top(), fr.w, fr.top() - node.top()));
    }
}

fn prune_within(v: &mut Vec<Rect>) {
    let mut i = 0;
    while i < v.len() {
        let a = v[i];
        let dominated = v
            .iter()
            .enumerate()
            .any(|(j, b)| j != i && b.contains(&a));
        if dominated {
            v.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

impl PackerEngine for MaxRectsPacker {
    fn name(&self) -> &str {
        &self.name
    }
    fn bin_width(&self) -> u32 {
        self.bin.w
    }
    fn bin_height(&self) -> u32 {
        self.bin.h
    }
    fn allow_rotation(&self) -> bool {
        self.allow_rotation
    }

    fn select_best_position(&self, width: u32, height: u32) -> Result<Vec<Rect>> {
        check_item(width, height)?;
        Ok(self.find_position(width, height).into_iter().collect())
    }

    fn place_rect(&mut self, width: u32, height: u32, x: u32, y: u32) {
        let node = Rect::new(x, y, width, height);
        debug_assert!(self.bin.contains(&node), "{node:?} outside bin");
        self.split_free(&node);
        self.used.push(node);
    }

    fn rectangles(&self) -> &[Rect] {
        &self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_free_contains(p: &MaxRectsPacker, target: &Rect) -> bool {
        p.free_rects().iter().any(|f| f.contains(target))
    }

    #[test]
    fn empty_bin_has_one_free_rect() {
        let p = MaxRectsPacker::new(100, 80, true, MaxRectsHeuristic::BestAreaFit);
        assert_eq!(p.free_rects(), &[Rect::new(0, 0, 100, 80)]);
    }

    #[test]
    fn split_produces_maximal_strips() {
        let mut p = MaxRectsPacker::new(100, 100, true, MaxRectsHeuristic::FirstFit);
        p.place_rect(10, 10, 0, 0);
        let mut free = p.free_rects().to_vec();
        free.sort_by_key(|r| (r.x, r.y, r.w, r.h));
        assert_eq!(
            free,
            vec![Rect::new(0, 10, 100, 90), Rect::new(10, 0, 90, 100)]
        );
    }

    #[test]
    fn foreign_placement_in_the_middle() {
        let mut p = MaxRectsPacker::new(100, 100, false, MaxRectsHeuristic::BestShortSideFit);
        p.place_rect(20, 20, 40, 40);
        assert_eq!(p.free_rects().len(), 4);
        assert!(total_free_contains(&p, &Rect::new(0, 0, 40, 100)));
        assert!(total_free_contains(&p, &Rect::new(60, 0, 40, 100)));
        assert!(total_free_contains(&p, &Rect::new(0, 0, 100, 40)));
        assert!(total_free_contains(&p, &Rect::new(0, 60, 100, 40)));
        for f in p.free_rects() {
            assert!(!f.intersects(&Rect::new(40, 40, 20, 20)));
        }
    }

    #[test]
    fn bottom_left_prefers_lowest_top() {
        let mut p = MaxRectsPacker::new(100, 100, false, MaxRectsHeuristic::BottomLeft);
        p.place_rect(50, 30, 0, 0);
        let c = p.select_best_position(20, 20).unwrap();
        assert_eq!(c, vec![Rect::new(50, 0, 20, 20)]);
    }

    #[test]
    fn rotates_when_only_rotated_fits() {
        let p = MaxRectsPacker::new(16, 12, true, MaxRectsHeuristic::BestAreaFit);
        let c = p.select_best_position(8, 14).unwrap();
        assert_eq!(c, vec![Rect::new(0, 0, 14, 8)]);

        let p = MaxRectsPacker::new(16, 12, false, MaxRectsHeuristic::BestAreaFit);
        assert!(p.select_best_position(8, 14).unwrap().is_empty());
    }

    #[test]
    fn zero_sized_item_is_rejected() {
        let p = MaxRectsPacker::new(16, 12, true, MaxRectsHeuristic::FirstFit);
        assert!(p.select_best_position(0, 3).is_err());
    }

    #[test]
    fn fitness_rejects_oversize() {
        let p = MaxRectsPacker::new(16, 12, true, MaxRectsHeuristic::BestShortSideFit);
        let fr = Rect::new(0, 0, 10, 10);
        assert_eq!(p.fitness(&fr, 11, 5), None);
        assert_eq!(p.fitness(&fr, 10, 4), Some((0, 6)));
    }

    #[test]
    fn full_bin_has_no_free_space() {
        let mut p = MaxRectsPacker::new(20, 10, true, MaxRectsHeuristic::FirstFit);
        p.place_rect(10, 10, 0, 0);
        p.place_rect(10, 10, 10, 0);
        assert!(p.free_rects().is_empty());
        assert!(p.select_best_position(1, 1).unwrap().is_empty());
    }
}
