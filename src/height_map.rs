//! Skyline height map of a container cross-section.
//!
//! The free space is tracked as an ordered list of contiguous segments that
//! together span the container width. Each segment records how deep the
//! section is already occupied at its lateral position. Pallets are always
//! inserted against the lowest segment; when nothing fits there, the segment
//! is merged into a neighbor so the loading loop can make progress.

use crate::types::{EPSILON_GENERAL, Footprint};

/// One step of the skyline.
///
/// # Fields
/// * `height` - Occupied depth at this lateral position
/// * `width` - Lateral extent, always > 0
/// * `x` - Depth coordinate at which the next pallet starts
/// * `y` - Lateral start coordinate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub height: f64,
    pub width: f64,
    pub x: f64,
    pub y: f64,
}

impl Segment {
    fn end(&self) -> f64 {
        self.y + self.width
    }

    /// Raises this segment to at least the level of `other`.
    fn raise_to(&mut self, other: &Segment) {
        if other.height > self.height {
            self.height = other.height;
            self.x = other.x;
        }
    }
}

/// Placement coordinates returned by [`HeightMap::insert`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Depth coordinate of the pallet's near edge.
    pub x: f64,
    /// Lateral coordinate of the pallet's left edge.
    pub y: f64,
}

/// How many more pallets of one footprint the lowest segment could still take.
///
/// Only used to compare the two orientations of a pallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityRating {
    pub along_height: i64,
    pub along_width: i64,
}

impl CapacityRating {
    /// Component-wise `>=`.
    pub fn dominates(&self, other: &Self) -> bool {
        self.along_height >= other.along_height && self.along_width >= other.along_width
    }
}

/// Which side of the lowest segment a pallet is pushed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Outcome of splitting the lowest segment for one pallet.
///
/// `used` is the raised piece under the pallet, `remainder` the untouched rest
/// (if any) at the old height.
#[derive(Clone, Copy, Debug)]
struct Split {
    side: Side,
    used: Segment,
    remainder: Option<Segment>,
    lateral: f64,
    depth: f64,
}

impl Split {
    /// Replacement segments in lateral order.
    fn pieces(&self) -> impl Iterator<Item = Segment> {
        let ordered = match self.side {
            Side::Left => [Some(self.used), self.remainder],
            Side::Right => [self.remainder, Some(self.used)],
        };
        ordered.into_iter().flatten()
    }
}

/// The skyline profile of one loading attempt.
#[derive(Clone, Debug)]
pub struct HeightMap {
    height: f64,
    width: f64,
    padding: f64,
    segments: Vec<Segment>,
    lowest: usize,
}

impl HeightMap {
    /// Creates an empty profile: a single segment at depth 0 spanning the width.
    ///
    /// Dimensions are expected to be validated by the caller.
    pub fn new(height: f64, width: f64, padding: f64) -> Self {
        Self {
            height,
            width,
            padding,
            segments: vec![Segment {
                height: 0.0,
                width,
                x: 0.0,
                y: 0.0,
            }],
            lowest: 0,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn lowest_segment(&self) -> &Segment {
        &self.segments[self.lowest]
    }

    /// True once the lowest segment reached the container height.
    ///
    /// The lowest segment is the limiting one, so every other segment is full too.
    pub fn is_full(&self) -> bool {
        self.lowest_segment().height >= self.height - EPSILON_GENERAL
    }

    fn update_lowest(&mut self) {
        let mut lowest = 0;
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.height < self.segments[lowest].height {
                lowest = index;
            }
        }
        self.lowest = lowest;
    }

    fn is_interior(&self, segment: &Segment) -> bool {
        segment.y > EPSILON_GENERAL && segment.end() < self.width - EPSILON_GENERAL
    }

    /// Padding charged across the width: twice for interior segments, once
    /// when the segment touches a container wall.
    fn padding_coefficient(&self, segment: &Segment) -> f64 {
        if self.is_interior(segment) { 2.0 } else { 1.0 }
    }

    /// Computes how `item` would split the lowest segment without touching state.
    fn split_lowest(&self, item: &impl Footprint) -> Option<Split> {
        let segment = self.segments[self.lowest];
        let coefficient = self.padding_coefficient(&segment);
        let used_width = item.width() + coefficient * self.padding;
        let used_height = item.height() + self.padding;

        if used_width > segment.width + EPSILON_GENERAL
            || used_height > self.height - segment.height + EPSILON_GENERAL
        {
            return None;
        }

        let remainder_width = segment.width - used_width;
        let (used_width, remainder_width) = if remainder_width <= EPSILON_GENERAL {
            (segment.width, 0.0)
        } else {
            (used_width, remainder_width)
        };

        let side = if segment.y <= self.width - segment.y - segment.width {
            Side::Left
        } else {
            Side::Right
        };

        let (used_y, remainder_y) = match side {
            Side::Left => (segment.y, segment.y + used_width),
            Side::Right => (segment.y + remainder_width, segment.y),
        };
        let used = Segment {
            height: segment.height + used_height,
            width: used_width,
            x: segment.x + used_height,
            y: used_y,
        };
        let remainder = (remainder_width > 0.0).then_some(Segment {
            width: remainder_width,
            y: remainder_y,
            ..segment
        });
        // The right-hand split already reserves the padding in `used.y`.
        let lateral = match side {
            Side::Left => used.y + self.padding,
            Side::Right => used.y,
        };

        Some(Split {
            side,
            used,
            remainder,
            lateral,
            depth: segment.x + self.padding,
        })
    }

    /// Places `item` (already in its final orientation) against the lowest segment.
    ///
    /// # Returns
    /// `Some(Placement)` with the pallet's coordinates, `None` if it does not fit
    pub fn insert(&mut self, item: &impl Footprint) -> Option<Placement> {
        let split = self.split_lowest(item)?;
        let index = self.lowest;
        self.segments.splice(index..=index, split.pieces());
        self.update_lowest();

        Some(Placement {
            x: split.depth,
            y: split.lateral,
        })
    }

    /// Rates how many more pallets of this footprint the lowest segment could
    /// hold after inserting `item`. Never mutates the profile.
    ///
    /// # Returns
    /// `None` if the pallet does not fit at all
    pub fn insert_rating(&self, item: &impl Footprint) -> Option<CapacityRating> {
        let split = self.split_lowest(item)?;
        let remainder_width = split.remainder.map_or(0.0, |segment| segment.width);
        let along_height =
            ((self.height - split.used.height) / (item.height() + self.padding)).floor();
        let along_width = (remainder_width / (item.width() + self.padding)).floor();

        Some(CapacityRating {
            along_height: along_height.max(0.0) as i64,
            along_width: along_width.max(0.0) as i64,
        })
    }

    /// Reclaims the lowest segment when no pending pallet fits it.
    ///
    /// The segment is merged into its shorter neighbor (both neighbors when
    /// they are level). An isolated segment is marked as full instead.
    pub fn align_lowest_place(&mut self) {
        let index = self.lowest;
        let lowest = self.segments[index];
        let left = index.checked_sub(1).map(|i| self.segments[i]);
        let right = self.segments.get(index + 1).copied();

        match (left, right) {
            (None, None) => {
                let segment = &mut self.segments[index];
                segment.height = self.height;
                segment.x = self.height;
            }
            (Some(_), None) => self.merge_into_left(index),
            (None, Some(_)) => self.merge_into_right(index),
            (Some(l), Some(r)) => {
                if l.height < r.height {
                    self.merge_into_left(index);
                } else if r.height < l.height {
                    self.merge_into_right(index);
                } else {
                    let target = &mut self.segments[index - 1];
                    target.width += lowest.width + r.width;
                    target.raise_to(&lowest);
                    target.raise_to(&r);
                    self.segments.drain(index..=index + 1);
                }
            }
        }

        log::trace!(
            "aligned lowest place at y={} ({} segments left)",
            lowest.y,
            self.segments.len()
        );
        self.update_lowest();
    }

    /// Merges the segment at `index` into its left neighbor and removes it.
    fn merge_into_left(&mut self, index: usize) {
        let merged = self.segments.remove(index);
        let target = &mut self.segments[index - 1];
        target.width += merged.width;
        target.raise_to(&merged);
    }

    /// Merges the segment at `index` into its right neighbor, which then starts
    /// at the merged segment's `y`.
    fn merge_into_right(&mut self, index: usize) {
        let merged = self.segments.remove(index);
        let target = &mut self.segments[index];
        target.width += merged.width;
        target.y = merged.y;
        target.raise_to(&merged);
    }

    /// Folds every segment that touches neither wall into a neighbor.
    ///
    /// Each interior segment goes toward the side its center is displaced to
    /// (leftward on an exact tie). The merged segment keeps the higher level.
    pub fn align_center_places(&mut self) {
        let mut folded = 0usize;
        while let Some(index) = self
            .segments
            .iter()
            .position(|segment| self.is_interior(segment))
        {
            let segment = self.segments[index];
            let displacement = 2.0 * segment.y + segment.width - self.width;
            if displacement > 0.0 {
                self.merge_into_right(index);
            } else {
                self.merge_into_left(index);
            }
            folded += 1;
        }

        if folded > 0 {
            log::trace!("folded {} interior segments", folded);
            self.update_lowest();
        }
    }

    #[cfg(test)]
    pub(crate) fn from_segments(
        height: f64,
        width: f64,
        padding: f64,
        segments: Vec<Segment>,
    ) -> Self {
        let mut map = Self {
            height,
            width,
            padding,
            segments,
            lowest: 0,
        };
        map.update_lowest();
        map
    }
}
