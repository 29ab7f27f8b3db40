//! Geometric checks on a finished loading plan.
//!
//! The height map never produces overlapping pallets by construction; these
//! helpers make that verifiable on the output alone.

use crate::model::{ContainerSection, PlacedPallet};
use crate::types::EPSILON_GENERAL;

/// Computes the overlap of two intervals in one dimension.
///
/// # Returns
/// Length of the overlap, at least 0.0
///
/// # Example
/// ```
/// use pallet_loader::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Checks whether two placed pallets share floor area.
///
/// Pallets that only touch along an edge do not intersect.
pub fn intersects(a: &PlacedPallet, b: &PlacedPallet) -> bool {
    a.rect().intersects_with_tolerance(&b.rect(), EPSILON_GENERAL)
}

/// Checks whether a placed pallet lies entirely inside the section.
pub fn fits_in_section(placed: &PlacedPallet, section: &ContainerSection) -> bool {
    placed
        .rect()
        .fits_within(section.height, section.width, EPSILON_GENERAL)
}

/// Depth gap between two pallets that share lateral space.
///
/// # Returns
/// `None` if the pallets are side by side (no lateral overlap), otherwise the
/// free distance between them along the depth axis (0.0 when they intersect)
pub fn depth_clearance(a: &PlacedPallet, b: &PlacedPallet) -> Option<f64> {
    let (ra, rb) = (a.rect(), b.rect());
    if overlap_1d(ra.y, ra.max_y(), rb.y, rb.max_y()) <= EPSILON_GENERAL {
        return None;
    }
    let gap = if ra.x <= rb.x {
        rb.x - ra.max_x()
    } else {
        ra.x - rb.max_x()
    };
    Some(gap.max(0.0))
}

/// Lists every pair of pallets (by index) that intersect.
pub fn find_overlaps(placed: &[PlacedPallet]) -> Vec<(usize, usize)> {
    let mut overlaps = Vec::new();
    for (i, a) in placed.iter().enumerate() {
        for (j, b) in placed.iter().enumerate().skip(i + 1) {
            if intersects(a, b) {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pallet;

    fn placed(id: usize, x: f64, y: f64, height: f64, width: f64) -> PlacedPallet {
        PlacedPallet {
            pallet: Pallet::new(id, height, width, false).unwrap(),
            x,
            y,
            rotated: false,
        }
    }

    #[test]
    fn overlap_1d_cases() {
        assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
        assert_eq!(overlap_1d(0.0, 5.0, 5.0, 8.0), 0.0);
        assert_eq!(overlap_1d(0.0, 5.0, 6.0, 8.0), 0.0);
    }

    #[test]
    fn detects_intersections() {
        let a = placed(1, 0.0, 0.0, 4.0, 4.0);
        let b = placed(2, 2.0, 2.0, 4.0, 4.0);
        let c = placed(3, 4.0, 0.0, 4.0, 4.0);
        assert!(intersects(&a, &b));
        assert!(!intersects(&a, &c));
        assert_eq!(find_overlaps(&[a, b, c]), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn section_containment() {
        let section = ContainerSection::new(10.0, 6.0).unwrap();
        assert!(fits_in_section(&placed(1, 6.0, 2.0, 4.0, 4.0), &section));
        assert!(!fits_in_section(&placed(2, 7.0, 0.0, 4.0, 4.0), &section));
        assert!(!fits_in_section(&placed(3, 0.0, 3.0, 4.0, 4.0), &section));
    }

    #[test]
    fn depth_clearance_only_for_shared_lanes() {
        let a = placed(1, 0.0, 0.0, 4.0, 4.0);
        let above = placed(2, 5.0, 2.0, 4.0, 4.0);
        let beside = placed(3, 0.0, 4.0, 4.0, 4.0);
        assert_eq!(depth_clearance(&a, &above), Some(1.0));
        assert_eq!(depth_clearance(&above, &a), Some(1.0));
        assert_eq!(depth_clearance(&a, &beside), None);
    }
}
