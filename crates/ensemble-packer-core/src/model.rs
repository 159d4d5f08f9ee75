use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in bin units. `x,y` is the lower-left corner (y grows upward);
/// `w,h` are sizes.
///
/// Equality and hashing cover all four fields, so two candidates are the same
/// candidate exactly when they occupy the same cells.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Exclusive right edge coordinate (`x + w`).
    #[inline]
    pub fn right(&self) -> u32 {
        self.x + self.w
    }
    /// Exclusive top edge coordinate (`y + h`).
    #[inline]
    pub fn top(&self) -> u32 {
        self.y + self.h
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
    pub fn perimeter(&self) -> u64 {
        2 * (self.w as u64 + self.h as u64)
    }
    /// Returns true if an item of `w x h` fits inside `self` without rotation.
    #[inline]
    pub fn fits(&self, w: u32, h: u32) -> bool {
        w <= self.w && h <= self.h
    }
    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.top() <= self.top()
    }
    /// Returns true if the interiors of `self` and `r` overlap. Touching edges do not count.
    pub fn intersects(&self, r: &Rect) -> bool {
        !(self.x >= r.right() || r.x >= self.right() || self.y >= r.top() || r.y >= self.top())
    }
}

/// Length of the shared part of `[a1, a2)` and `[b1, b2)`; zero when disjoint.
#[inline]
pub fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    let start = a1.max(b1);
    let end = a2.min(b2);
    end.saturating_sub(start)
}

/// Statistics about how full a bin is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BinStats {
    /// Number of committed rectangles.
    pub num_rects: usize,
    /// Bin area (width * height).
    pub bin_area: u64,
    /// Sum of committed rectangle areas.
    pub used_area: u64,
    /// Occupancy ratio: used_area / bin_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl BinStats {
    pub fn from_rects(bin_width: u32, bin_height: u32, rects: &[Rect]) -> Self {
        let bin_area = (bin_width as u64) * (bin_height as u64);
        let used_area: u64 = rects.iter().map(Rect::area).sum();
        let occupancy = if bin_area > 0 {
            used_area as f64 / bin_area as f64
        } else {
            0.0
        };
        Self {
            num_rects: rects.len(),
            bin_area,
            used_area,
            occupancy,
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Rects: {}, Occupancy: {:.2}%, Used Area: {}, Bin Area: {}",
            self.num_rects,
            self.occupancy * 100.0,
            self.used_area,
            self.bin_area,
        )
    }

    /// Returns the uncovered area.
    pub fn wasted_area(&self) -> u64 {
        self.bin_area.saturating_sub(self.used_area)
    }
}

/// Snapshot of a packed bin, suitable for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub rects: Vec<Rect>,
    pub stats: BinStats,
}

impl Layout {
    pub fn new(width: u32, height: u32, rects: Vec<Rect>) -> Self {
        let stats = BinStats::from_rects(width, height, &rects);
        Self {
            width,
            height,
            rects,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 5, 10);
        let c = Rect::new(9, 9, 2, 2);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(b.intersects(&c));
    }

    #[test]
    fn overlap_of_disjoint_ranges_is_zero() {
        assert_eq!(overlap_1d(0, 10, 10, 20), 0);
        assert_eq!(overlap_1d(0, 10, 4, 20), 6);
        assert_eq!(overlap_1d(5, 8, 0, 20), 3);
    }

    #[test]
    fn stats_of_half_filled_bin() {
        let rects = [Rect::new(0, 0, 50, 100)];
        let s = BinStats::from_rects(100, 100, &rects);
        assert_eq!(s.num_rects, 1);
        assert_eq!(s.used_area, 5000);
        assert_eq!(s.wasted_area(), 5000);
        assert!((s.occupancy - 0.5).abs() < 1e-12);
    }
}
