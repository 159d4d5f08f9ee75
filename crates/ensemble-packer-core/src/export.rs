use crate::model::{Layout, Rect};
use crate::packer::corner_points::adjacency_in;
use serde_json::{Value, json};

fn rect_json(r: &Rect) -> Value {
    json!({"x": r.x, "y": r.y, "w": r.w, "h": r.h})
}

/// Serialize a packed bin as `{ bin, rects, stats }`.
/// Each rect carries its commit index so consumers can map placements back to items.
pub fn layout_to_json(layout: &Layout) -> Value {
    let rects: Vec<Value> = layout
        .rects
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "index": i,
                "frame": rect_json(r),
            })
        })
        .collect();
    json!({
        "bin": {"w": layout.width, "h": layout.height},
        "rects": rects,
        "stats": &layout.stats,
    })
}

/// Serialize a candidate list for one item against the bin described by `layout`.
/// Shape: `{ item: {w, h}, candidates: [{ frame, rotated, adjacency }] }`.
pub fn candidates_to_json(layout: &Layout, item: (u32, u32), candidates: &[Rect]) -> Value {
    let (w, h) = item;
    let list: Vec<Value> = candidates
        .iter()
        .map(|c| {
            let adj = adjacency_in(layout.width, layout.height, &layout.rects, c);
            json!({
                "frame": rect_json(c),
                "rotated": (c.w, c.h) != (w, h),
                "adjacency": adj.score(),
            })
        })
        .collect();
    json!({
        "item": {"w": w, "h": h},
        "candidates": list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_json_has_indices_and_stats() {
        let layout = Layout::new(
            20,
            10,
            vec![Rect::new(0, 0, 10, 10), Rect::new(10, 0, 5, 5)],
        );
        let v = layout_to_json(&layout);
        assert_eq!(v["bin"]["w"], 20);
        assert_eq!(v["rects"][1]["index"], 1);
        assert_eq!(v["rects"][1]["frame"]["x"], 10);
        assert_eq!(v["stats"]["num_rects"], 2);
    }

    #[test]
    fn candidate_json_flags_rotation() {
        let layout = Layout::new(100, 100, Vec::new());
        let v = candidates_to_json(
            &layout,
            (10, 20),
            &[Rect::new(0, 0, 10, 20), Rect::new(0, 0, 20, 10)],
        );
        assert_eq!(v["candidates"][0]["rotated"], false);
        assert_eq!(v["candidates"][1]["rotated"], true);
        assert_eq!(v["candidates"][0]["adjacency"], 0.5);
    }
}
