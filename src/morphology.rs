//! Binary morphology over Mask rasters: single-step erosion and
//! reconstruction by propagation, combined into the two-pass cleaning
//! scheme that strips noise specks and fills small holes.
//!
//! The structuring element is a one-step 4-connected cross, matching the
//! labeler's connectivity. Pixels outside the image count as background,
//! so foreground touching the border erodes there like anywhere else.

use std::collections::VecDeque;

use crate::image_funcs::Mask;

const NEIGHBORS_4: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Erodes the mask by one structuring-element step: a pixel survives only
/// if it and its four neighbors are all foreground.
pub fn erode(mask: &Mask) -> Mask {
    let (width, height) = (mask.width() as i32, mask.height() as i32);
    let mut out = Mask::new(mask.width(), mask.height());
    for y in 0..height {
        for x in 0..width {
            if !mask.get(x as u32, y as u32) {
                continue;
            }
            let mut survives = true;
            for (dx, dy) in NEIGHBORS_4 {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || nx >= width || ny < 0 || ny >= height
                    || !mask.get(nx as u32, ny as u32)
                {
                    survives = false;
                    break;
                }
            }
            if survives {
                out.set(x as u32, y as u32, true);
            }
        }
    }
    out
}

/// Morphological reconstruction by propagation: grows `seed` inside
/// `boundary` until stable. Restores the full extent of any boundary
/// component that kept at least one seed pixel; components with no seed
/// vanish.
pub fn propagate(seed: &Mask, boundary: &Mask) -> Mask {
    assert_eq!(seed.width(), boundary.width());
    assert_eq!(seed.height(), boundary.height());
    let (width, height) = (seed.width() as i32, seed.height() as i32);
    let mut out = Mask::new(seed.width(), seed.height());
    let mut queue = VecDeque::new();
    for y in 0..seed.height() {
        for x in 0..seed.width() {
            if seed.get(x, y) && boundary.get(x, y) {
                out.set(x, y, true);
                queue.push_back((x as i32, y as i32));
            }
        }
    }
    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in NEIGHBORS_4 {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || nx >= width || ny < 0 || ny >= height {
                continue;
            }
            let (ux, uy) = (nx as u32, ny as u32);
            if boundary.get(ux, uy) && !out.get(ux, uy) {
                out.set(ux, uy, true);
                queue.push_back((nx, ny));
            }
        }
    }
    out
}

/// Two-pass cleanup. The foreground pass erodes and reconstructs,
/// removing components too small to survive erosion while restoring
/// everything else to full extent. The background pass applies the same
/// procedure to the complement, closing small holes inside the surviving
/// regions.
pub fn clean_mask(mask: &Mask) -> Mask {
    let foreground = propagate(&erode(mask), mask);
    let background = foreground.complement();
    let filled = propagate(&erode(&background), &background);
    filled.complement()
}

#[cfg(test)]
mod tests {
    use super::*;

    // A width x height mask with a solid rectangle of foreground.
    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, w: u32, h: u32) -> Mask {
        let mut mask = Mask::new(width, height);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.set(x, y, true);
            }
        }
        mask
    }

    #[test]
    fn test_erode_shrinks_square_by_one() {
        let mask = rect_mask(9, 9, 2, 2, 5, 5);
        let eroded = erode(&mask);
        assert_eq!(eroded, rect_mask(9, 9, 3, 3, 3, 3));
    }

    #[test]
    fn test_erode_treats_border_as_background() {
        // Foreground flush with the image edge still loses its rim.
        let mask = rect_mask(4, 4, 0, 0, 4, 4);
        let eroded = erode(&mask);
        assert_eq!(eroded, rect_mask(4, 4, 1, 1, 2, 2));
    }

    #[test]
    fn test_propagate_restores_seeded_component_only() {
        let mut boundary = rect_mask(12, 8, 1, 1, 5, 5);
        // Second component with no seed.
        for y in 2..5 {
            for x in 8..11 {
                boundary.set(x, y, true);
            }
        }
        let mut seed = Mask::new(12, 8);
        seed.set(3, 3, true);
        let out = propagate(&seed, &boundary);
        assert_eq!(out, rect_mask(12, 8, 1, 1, 5, 5));
    }

    #[test]
    fn test_clean_removes_isolated_specks() {
        let mut mask = rect_mask(16, 16, 2, 2, 5, 5);
        mask.set(12, 12, true);
        // A 2x2 block has no pixel surviving cross erosion either.
        mask.set(12, 3, true);
        mask.set(13, 3, true);
        mask.set(12, 4, true);
        mask.set(13, 4, true);
        let cleaned = clean_mask(&mask);
        assert_eq!(cleaned, rect_mask(16, 16, 2, 2, 5, 5));
    }

    #[test]
    fn test_clean_fills_single_pixel_hole() {
        let mut mask = rect_mask(9, 9, 2, 2, 5, 5);
        mask.set(4, 4, false);
        let cleaned = clean_mask(&mask);
        assert_eq!(cleaned, rect_mask(9, 9, 2, 2, 5, 5));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut mask = rect_mask(16, 16, 2, 2, 6, 6);
        mask.set(10, 12, true);
        mask.set(4, 4, false);
        let once = clean_mask(&mask);
        let twice = clean_mask(&once);
        assert_eq!(once, twice);
    }
}
