use super::PackerEngine;
use crate::config::{EngineSpec, GuillotineChoice, SkylineHeuristic};
use crate::error::{Result, check_item};
use crate::model::{Rect, overlap_1d};
use serde::Serialize;

/// One horizontal piece of the skyline: everything in `[x, x + w)` below `y` is
/// considered used (or recovered by the waste map).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SkylineSegment {
    pub x: u32,
    pub y: u32,
    pub w: u32,
}

impl SkylineSegment {
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
}

pub struct SkylinePacker {
    name: String,
    bin: Rect,
    allow_rotation: bool,
    skylines: Vec<SkylineSegment>,
    heuristic: SkylineHeuristic,
    waste: Option<WasteMap>,
    used: Vec<Rect>,
}

impl SkylinePacker {
    pub fn new(width: u32, height: u32, allow_rotation: bool, heuristic: SkylineHeuristic) -> Self {
        Self {
            name: EngineSpec::Skyline {
                heuristic,
                use_waste_map: false,
                g_choice: GuillotineChoice::BestAreaFit,
            }
            .label(),
            bin: Rect::new(0, 0, width, height),
            allow_rotation,
            skylines: vec![SkylineSegment {
                x: 0,
                y: 0,
                w: width,
            }],
            heuristic,
            waste: None,
            used: Vec::new(),
        }
    }

    /// Enables gap recovery below the skyline.
    pub fn with_waste_map(mut self, choice: GuillotineChoice) -> Self {
        self.name = EngineSpec::Skyline {
            heuristic: self.heuristic,
            use_waste_map: true,
            g_choice: choice,
        }
        .label();
        self.waste = Some(WasteMap::new(self.allow_rotation, choice));
        self
    }

    pub fn has_waste_map(&self) -> bool {
        self.waste.is_some()
    }

    /// Skyline profile, left to right, covering the whole bin width.
    pub fn skyline(&self) -> &[SkylineSegment] {
        &self.skylines
    }

    /// Free rectangles currently held by the waste map (empty when disabled).
    pub fn waste_rects(&self) -> &[Rect] {
        match &self.waste {
            Some(wm) => &wm.free,
            None => &[],
        }
    }

    /// Highest skyline point under `[x, x + w)`.
    fn support_height(&self, x: u32, w: u32) -> u32 {
        self.skylines
            .iter()
            .filter(|s| overlap_1d(s.x, s.right(), x, x + w) > 0)
            .map(|s| s.y)
            .max()
            .unwrap_or(0)
    }

    fn can_put(&self, x: u32, w: u32, h: u32) -> Option<Rect> {
        if x + w > self.bin.right() {
            return None;
        }
        let rect = Rect::new(x, self.support_height(x, w), w, h);
        if !self.bin.contains(&rect) {
            return None;
        }
        Some(rect)
    }

    /// Candidate x positions for an item of width `w`: each segment's left edge and each
    /// segment's right edge minus `w`, ascending. A point produced by two edges appears twice.
    fn placement_points(&self, w: u32) -> Vec<u32> {
        let mut points: Vec<u32> = Vec::with_capacity(self.skylines.len() * 2);
        for s in &self.skylines {
            if s.x + w <= self.bin.right() {
                points.push(s.x);
            }
            if s.right() >= w {
                points.push(s.right() - w);
            }
        }
        points.sort_unstable();
        points
    }

    /// Every position where a `w x h` item can rest on the skyline, in x order.
    pub fn generate_placements(&self, w: u32, h: u32) -> Vec<Rect> {
        self.placement_points(w)
            .into_iter()
            .filter_map(|x| self.can_put(x, w, h))
            .collect()
    }

    fn wasted_area_for(&self, r: &Rect) -> u64 {
        self.skylines
            .iter()
            .filter(|s| s.y < r.y)
            .map(|s| overlap_1d(s.x, s.right(), r.x, r.right()) as u64 * (r.y - s.y) as u64)
            .sum()
    }

    fn find_skyline(&self, w: u32, h: u32) -> Option<Rect> {
        let mut placements = self.generate_placements(w, h);
        if self.allow_rotation && w != h {
            placements.extend(self.generate_placements(h, w));
        }
        match self.heuristic {
            SkylineHeuristic::BottomLeft => placements.into_iter().min_by_key(|r| (r.top(), r.x)),
            SkylineHeuristic::MinWaste => placements
                .into_iter()
                .min_by_key(|r| (self.wasted_area_for(r), r.top(), r.x)),
        }
    }

    /// Lifts every skyline point under `node` to at least `node.top()`.
    fn raise(&mut self, node: &Rect) {
        let mut out: Vec<SkylineSegment> = Vec::with_capacity(self.skylines.len() + 2);
        for seg in &self.skylines {
            if seg.right() <= node.x || seg.x >= node.right() {
                out.push(*seg);
                continue;
            }
            if seg.x < node.x {
                out.push(SkylineSegment {
                    x: seg.x,
                    y: seg.y,
                    w: node.x - seg.x,
                });
            }
            let left = seg.x.max(node.x);
            let right = seg.right().min(node.right());
            out.push(SkylineSegment {
                x: left,
                y: seg.y.max(node.top()),
                w: right - left,
            });
            if seg.right() > node.right() {
                out.push(SkylineSegment {
                    x: node.right(),
                    y: seg.y,
                    w: seg.right() - node.right(),
                });
            }
        }
        self.skylines = out;
        self.merge();
    }

    fn merge(&mut self) {
        let mut i = 1;
        while i < self.skylines.len() {
            if self.skylines[i - 1].y == self.skylines[i].y {
                let w = self.skylines[i].w;
                self.skylines[i - 1].w += w;
                self.skylines.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn add_waste_areas(&mut self, node: &Rect) {
        let Some(wm) = self.waste.as_mut() else {
            return;
        };
        // The vertical gap between each covered segment and the bottom of `node`
        // becomes unreachable for the skyline once the profile is raised.
        for seg in &self.skylines {
            if seg.y >= node.y {
                continue;
            }
            let left = seg.x.max(node.x);
            let right = seg.right().min(node.right());
            if right > left {
                wm.add_area(Rect::new(left, seg.y, right - left, node.y - seg.y));
            }
        }
    }
}

impl PackerEngine for SkylinePacker {
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
        // Try waste map first
        if let Some(r) = self.waste.as_ref().and_then(|wm| wm.choose(width, height)) {
            return Ok(vec![r]);
        }
        Ok(self.find_skyline(width, height).into_iter().collect())
    }

    fn place_rect(&mut self, width: u32, height: u32, x: u32, y: u32) {
        let node = Rect::new(x, y, width, height);
        debug_assert!(self.bin.contains(&node), "{node:?} outside bin");
        if let Some(wm) = self.waste.as_mut() {
            wm.occupy(&node);
        }
        self.add_waste_areas(&node);
        self.raise(&node);
        self.used.push(node);
    }

    fn rectangles(&self) -> &[Rect] {
        &self.used
    }
}

// Guillotine-style free list of the gaps left under the skyline
#[derive(Clone)]
struct WasteMap {
    free: Vec<Rect>,
    allow_rotation: bool,
    choice: GuillotineChoice,
}

impl WasteMap {
    fn new(allow_rotation: bool, choice: GuillotineChoice) -> Self {
        // Starts empty; the skyline adds gaps as placements leave them behind.
        Self {
            free: Vec::new(),
            allow_rotation,
            choice,
        }
    }

    fn choose(&self, w: u32, h: u32) -> Option<Rect> {
        let mut best: Option<((i64, i64), Rect)> = None;
        for fr in &self.free {
            let mut consider = |w: u32, h: u32| {
                if fr.fits(w, h) {
                    let s = score_choice(self.choice, fr, w, h);
                    if best.as_ref().is_none_or(|(b, _)| s < *b) {
                        best = Some((s, Rect::new(fr.x, fr.y, w, h)));
                    }
                }
            };
            consider(w, h);
            if self.allow_rotation && w != h {
                consider(h, w);
            }
        }
        best.map(|(_, r)| r)
    }

    /// Subtracts `node` from every free rectangle it touches, keeping the list disjoint.
    fn occupy(&mut self, node: &Rect) {
        let mut new_free: Vec<Rect> = Vec::with_capacity(self.free.len() + 2);
        for fr in self.free.drain(..) {
            if !fr.intersects(node) {
                new_free.push(fr);
                continue;
            }
            let ix1 = fr.x.max(node.x);
            let iy1 = fr.y.max(node.y);
            let ix2 = fr.right().min(node.right());
            let iy2 = fr.top().min(node.top());

            // below
            if iy1 > fr.y {
                new_free.push(Rect::new(fr.x, fr.y, fr.w, iy1 - fr.y));
            }
            // above
            if iy2 < fr.top() {
                new_free.push(Rect::new(fr.x, iy2, fr.w, fr.top() - iy2));
            }
            // left strip within overlap band
            if ix1 > fr.x {
                new_free.push(Rect::new(fr.x, iy1, ix1 - fr.x, iy2 - iy1));
            }
            // right strip within overlap band
            if ix2 < fr.right() {
                new_free.push(Rect::new(ix2, iy1, fr.right() - ix2, iy2 - iy1));
            }
        }
        self.free = new_free;
        self.prune();
        self.merge();
    }

    fn add_area(&mut self, r: Rect) {
        if r.w > 0 && r.h > 0 {
            self.free.push(r);
        }
        self.prune();
        self.merge();
    }

    fn prune(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn merge(&mut self) {
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..self.free.len() {
                for j in i + 1..self.free.len() {
                    let a = self.free[i];
                    let b = self.free[j];
                    let joined = if a.y == b.y && a.h == b.h && a.right() == b.x {
                        Some(Rect::new(a.x, a.y, a.w + b.w, a.h))
                    } else if a.y == b.y && a.h == b.h && b.right() == a.x {
                        Some(Rect::new(b.x, a.y, a.w + b.w, a.h))
                    } else if a.x == b.x && a.w == b.w && a.top() == b.y {
                        Some(Rect::new(a.x, a.y, a.w, a.h + b.h))
                    } else if a.x == b.x && a.w == b.w && b.top() == a.y {
                        Some(Rect::new(a.x, b.y, a.w, a.h + b.h))
                    } else {
                        None
                    };
                    if let Some(r) = joined {
                        self.free[i] = r;
                        self.free.remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
    }
}

fn score_choice(choice: GuillotineChoice, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
    let area_fit = fr.area() as i64 - (w as i64 * h as i64);
    let leftover_h = fr.w as i64 - w as i64;
    let leftover_v = fr.h as i64 - h as i64;
    let short_fit = leftover_h.abs().min(leftover_v.abs());
    let long_fit = leftover_h.abs().max(leftover_v.abs());
    match choice {
        GuillotineChoice::BestAreaFit => (area_fit, short_fit),
        GuillotineChoice::BestShortSideFit => (short_fit, long_fit),
        GuillotineChoice::BestLongSideFit => (long_fit, short_fit),
        GuillotineChoice::WorstAreaFit => (-area_fit, -short_fit),
        GuillotineChoice::WorstShortSideFit => (-short_fit, -long_fit),
        GuillotineChoice::WorstLongSideFit => (-long_fit, -short_fit),
    }
}
