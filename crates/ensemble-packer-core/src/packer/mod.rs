use crate::error::Result;
use crate::model::Rect;

pub mod corner_points;
pub mod maxrects;
pub mod skyline;

/// A packer engine owns one fixed-size bin and proposes positions for new items.
///
/// Queries are read-only; commits go through `place_rect`, which must accept any
/// in-bounds, non-overlapping position, including ones the engine would not have chosen.
/// Several engines can therefore be driven in lockstep by an external caller.
pub trait PackerEngine: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;
    fn bin_width(&self) -> u32;
    fn bin_height(&self) -> u32;
    fn allow_rotation(&self) -> bool;

    /// Candidate positions for a `width x height` item, possibly rotated.
    ///
    /// Returns an empty list when the item fits nowhere. Zero-sized items are rejected
    /// with `PackError::InvalidDimension`.
    fn select_best_position(&self, width: u32, height: u32) -> Result<Vec<Rect>>;

    /// Commits a rectangle at an externally chosen position.
    fn place_rect(&mut self, width: u32, height: u32, x: u32, y: u32);

    /// Committed rectangles in commit order.
    fn rectangles(&self) -> &[Rect];

    /// Places an item at this engine's first candidate. `None` if it fits nowhere.
    fn pack(&mut self, width: u32, height: u32) -> Result<Option<Rect>> {
        let candidates = self.select_best_position(width, height)?;
        let Some(r) = candidates.first().copied() else {
            return Ok(None);
        };
        self.place_rect(r.w, r.h, r.x, r.y);
        Ok(Some(r))
    }
}
