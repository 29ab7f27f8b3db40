//! Loading logic for pallets in a container cross-section.
//!
//! This module drives the skyline height map:
//! - Pallets are normalized (upright pallets turned flat when allowed) and sorted widest first
//! - Each pallet is inserted against the lowest segment in its better orientation
//! - When no pallet fits, the lowest segment is compacted
//! - The whole run is repeated without rotation and the better yield wins

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::geometry;
use crate::height_map::HeightMap;
use crate::model::{ContainerSection, Pallet, PlacedPallet, ValidationError, validate_padding};
use crate::types::{Extent, Footprint};

/// Keys that the placed pallet owns and which are dropped from caller attributes.
const RESERVED_ATTRIBUTES: [&str; 3] = ["x", "y", "rotated"];

/// Options for one loading run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LoadOptions {
    /// Minimum clearance kept around every pallet
    pub padding: f64,
    /// Whether the middle of the section may be loaded independently of the walls
    pub center_loading: bool,
    /// Whether pallets that allow it may be turned at all
    pub allow_rotation: bool,
}

impl LoadOptions {
    pub const DEFAULT_PADDING: f64 = 0.0;
    pub const DEFAULT_CENTER_LOADING: bool = true;
    pub const DEFAULT_ALLOW_ROTATION: bool = true;

    /// Creates a builder for custom options.
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::default()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            padding: Self::DEFAULT_PADDING,
            center_loading: Self::DEFAULT_CENTER_LOADING,
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
        }
    }
}

/// Builder for LoadOptions.
#[derive(Clone, Debug, Default)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn padding(mut self, padding: f64) -> Self {
        self.options.padding = padding;
        self
    }

    pub fn center_loading(mut self, enabled: bool) -> Self {
        self.options.center_loading = enabled;
        self
    }

    pub fn allow_rotation(mut self, enabled: bool) -> Self {
        self.options.allow_rotation = enabled;
        self
    }

    pub fn build(self) -> LoadOptions {
        self.options
    }
}

/// Key figures of a loading plan.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LoadSummary {
    pub placed: usize,
    pub unplaced: usize,
    pub used_area: f64,
    pub container_area: f64,
    pub utilization_percent: f64,
    /// True when the run with rotation trial produced the returned plan
    pub rotation_pass_selected: bool,
}

/// Result of a loading run.
#[derive(Clone, Debug)]
pub struct LoadResult {
    pub placed: Vec<PlacedPallet>,
    pub unplaced: Vec<Pallet>,
    pub summary: LoadSummary,
}

impl LoadResult {
    /// Indicates whether every pallet was loaded.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Events emitted during loading, used for live progress streams.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LoadEvent {
    /// A pass over all pallets begins.
    PassStarted { rotation_trial: bool, pallets: usize },
    /// A pallet was placed.
    PalletPlaced {
        rotation_trial: bool,
        id: Value,
        x: f64,
        y: f64,
        height: f64,
        width: f64,
        rotated: bool,
    },
    /// No pending pallet fitted; the lowest segment was compacted.
    LowestPlaceAligned { rotation_trial: bool, segments: usize },
    /// A pass ended.
    PassFinished {
        rotation_trial: bool,
        placed: usize,
        unplaced: usize,
    },
    /// Loading finished with the selected pass.
    Finished {
        placed: usize,
        unplaced: usize,
        rotation_pass_selected: bool,
    },
}

/// Chosen orientation relative to a pallet's current (normalized) one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Orientation {
    Current,
    Turned,
}

/// A pending pallet together with its normalized orientation.
#[derive(Clone, Debug)]
struct Candidate<'a> {
    pallet: &'a Pallet,
    rotated: bool,
}

impl<'a> Candidate<'a> {
    /// Turns upright pallets flat upfront when the pass trials rotation.
    fn normalized(pallet: &'a Pallet, rotation_trial: bool) -> Self {
        Self {
            pallet,
            rotated: rotation_trial && pallet.allow_rotation && pallet.is_upright(),
        }
    }

    fn extent(&self) -> Extent {
        let extent = Extent::of(self.pallet);
        if self.rotated { extent.rotated() } else { extent }
    }

    fn may_turn(&self, rotation_trial: bool) -> bool {
        rotation_trial && self.pallet.allow_rotation
    }

    fn place(&self, orientation: Orientation, x: f64, y: f64) -> PlacedPallet {
        let rotated = self.rotated ^ (orientation == Orientation::Turned);
        let mut pallet = if rotated {
            self.pallet.rotated()
        } else {
            self.pallet.clone()
        };
        for key in RESERVED_ATTRIBUTES {
            pallet.attributes.remove(key);
        }
        PlacedPallet {
            pallet,
            x,
            y,
            rotated,
        }
    }
}

/// Outcome of a single pass.
#[derive(Clone, Debug)]
struct PassOutcome {
    placed: Vec<PlacedPallet>,
    unplaced: Vec<Pallet>,
}

/// Loads pallets into a container section.
///
/// Runs the skyline heuristic once with rotation trial and once without, and
/// returns the plan that places more pallets (ties favor rotation).
///
/// # Parameters
/// * `section` - Cross-section of the container body
/// * `pallets` - Pallets to load
/// * `options` - Padding, center loading and rotation switches
///
/// # Returns
/// `LoadResult` with placed pallets; pallets that did not fit are listed in `unplaced`
pub fn load_pallets(
    section: ContainerSection,
    pallets: Vec<Pallet>,
    options: LoadOptions,
) -> Result<LoadResult, ValidationError> {
    load_pallets_with_progress(section, pallets, options, |_| {})
}

/// Loading with a live progress callback.
///
/// Invokes the callback for every important step (suitable for SSE).
pub fn load_pallets_with_progress(
    section: ContainerSection,
    mut pallets: Vec<Pallet>,
    options: LoadOptions,
    mut on_event: impl FnMut(&LoadEvent),
) -> Result<LoadResult, ValidationError> {
    section.validate()?;
    validate_padding(options.padding)?;
    for pallet in &pallets {
        pallet.validate()?;
    }
    for (index, pallet) in pallets.iter_mut().enumerate() {
        if pallet.id.is_null() {
            pallet.id = Value::from(index);
        }
    }

    let rotation_outcome = options
        .allow_rotation
        .then(|| run_pass(&section, &pallets, &options, true, &mut on_event));
    let plain_outcome = run_pass(&section, &pallets, &options, false, &mut on_event);

    let (outcome, rotation_pass_selected) = match rotation_outcome {
        Some(rotated) if rotated.placed.len() >= plain_outcome.placed.len() => (rotated, true),
        _ => (plain_outcome, false),
    };

    log::debug!(
        "selected {} pass: {} placed, {} unplaced",
        if rotation_pass_selected {
            "rotation"
        } else {
            "plain"
        },
        outcome.placed.len(),
        outcome.unplaced.len()
    );

    on_event(&LoadEvent::Finished {
        placed: outcome.placed.len(),
        unplaced: outcome.unplaced.len(),
        rotation_pass_selected,
    });

    let summary = summarize(&section, &outcome, rotation_pass_selected);
    Ok(LoadResult {
        placed: outcome.placed,
        unplaced: outcome.unplaced,
        summary,
    })
}

fn summarize(
    section: &ContainerSection,
    outcome: &PassOutcome,
    rotation_pass_selected: bool,
) -> LoadSummary {
    let used_area: f64 = outcome.placed.iter().map(|p| p.area()).sum();
    let container_area = section.area();
    LoadSummary {
        placed: outcome.placed.len(),
        unplaced: outcome.unplaced.len(),
        used_area,
        container_area,
        utilization_percent: (used_area / container_area) * 100.0,
        rotation_pass_selected,
    }
}

/// Picks the orientation whose capacity rating dominates; mixed ratings keep
/// the current orientation.
fn choose_orientation(map: &HeightMap, candidate: &Candidate, rotation_trial: bool) -> Orientation {
    if !candidate.may_turn(rotation_trial) {
        return Orientation::Current;
    }

    let extent = candidate.extent();
    let current = map.insert_rating(&extent);
    let turned = map.insert_rating(&extent.rotated());

    match (current, turned) {
        (_, None) => Orientation::Current,
        (None, Some(_)) => Orientation::Turned,
        (Some(current), Some(turned)) => {
            if !current.dominates(&turned) && turned.dominates(&current) {
                Orientation::Turned
            } else {
                Orientation::Current
            }
        }
    }
}

/// Runs the main loop once.
///
/// # Parameters
/// * `rotation_trial` - Whether pallets may be turned in this pass
fn run_pass(
    section: &ContainerSection,
    pallets: &[Pallet],
    options: &LoadOptions,
    rotation_trial: bool,
    on_event: &mut impl FnMut(&LoadEvent),
) -> PassOutcome {
    on_event(&LoadEvent::PassStarted {
        rotation_trial,
        pallets: pallets.len(),
    });

    let mut pending: Vec<Candidate> = pallets
        .iter()
        .map(|pallet| Candidate::normalized(pallet, rotation_trial))
        .collect();
    // Widest first: wide pallets claim space while segments are still large.
    pending.sort_by(|a, b| {
        b.extent()
            .width
            .partial_cmp(&a.extent().width)
            .unwrap_or(Ordering::Equal)
    });

    let mut map = HeightMap::new(section.height, section.width, options.padding);
    let mut placed: Vec<PlacedPallet> = Vec::new();

    while !map.is_full() && !pending.is_empty() {
        let mut hit: Option<(usize, PlacedPallet)> = None;

        for (index, candidate) in pending.iter().enumerate() {
            let orientation = choose_orientation(&map, candidate, rotation_trial);
            let extent = match orientation {
                Orientation::Current => candidate.extent(),
                Orientation::Turned => candidate.extent().rotated(),
            };
            if let Some(placement) = map.insert(&extent) {
                hit = Some((index, candidate.place(orientation, placement.x, placement.y)));
                break;
            }
        }

        match hit {
            Some((index, placed_pallet)) => {
                pending.remove(index);
                log::trace!(
                    "placed pallet {} at ({}, {}){}",
                    placed_pallet.pallet.id,
                    placed_pallet.x,
                    placed_pallet.y,
                    if placed_pallet.rotated { " rotated" } else { "" }
                );
                on_event(&LoadEvent::PalletPlaced {
                    rotation_trial,
                    id: placed_pallet.pallet.id.clone(),
                    x: placed_pallet.x,
                    y: placed_pallet.y,
                    height: placed_pallet.pallet.height,
                    width: placed_pallet.pallet.width,
                    rotated: placed_pallet.rotated,
                });
                placed.push(placed_pallet);
            }
            None => {
                map.align_lowest_place();
                on_event(&LoadEvent::LowestPlaceAligned {
                    rotation_trial,
                    segments: map.segments().len(),
                });
            }
        }

        if !options.center_loading {
            map.align_center_places();
        }
    }

    debug_assert!(
        geometry::find_overlaps(&placed).is_empty(),
        "height map produced overlapping pallets"
    );

    let unplaced: Vec<Pallet> = pending
        .into_iter()
        .map(|candidate| candidate.pallet.clone())
        .collect();

    log::debug!(
        "{} pass finished: {} placed, {} unplaced",
        if rotation_trial { "rotation" } else { "plain" },
        placed.len(),
        unplaced.len()
    );
    on_event(&LoadEvent::PassFinished {
        rotation_trial,
        placed: placed.len(),
        unplaced: unplaced.len(),
    });

    PassOutcome { placed, unplaced }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;
    use proptest::prelude::*;
    use serde_json::json;

    fn section(height: f64, width: f64) -> ContainerSection {
        ContainerSection::new(height, width).unwrap()
    }

    fn pallet(id: usize, height: f64, width: f64, allow_rotation: bool) -> Pallet {
        Pallet::new(id, height, width, allow_rotation).unwrap()
    }

    fn no_rotation() -> LoadOptions {
        LoadOptions::builder().allow_rotation(false).build()
    }

    fn single_pass(
        section: &ContainerSection,
        pallets: &[Pallet],
        options: &LoadOptions,
        rotation_trial: bool,
    ) -> PassOutcome {
        run_pass(section, pallets, options, rotation_trial, &mut |_| {})
    }

    #[test]
    fn full_width_pallets_are_stacked_along_depth() {
        let pallets = vec![
            pallet(1, 4.0, 10.0, false),
            pallet(2, 4.0, 10.0, false),
            pallet(3, 4.0, 10.0, false),
        ];
        let result = load_pallets(section(10.0, 10.0), pallets, no_rotation()).unwrap();

        assert_eq!(result.placed.len(), 2);
        assert_eq!((result.placed[0].x, result.placed[0].y), (0.0, 0.0));
        assert_eq!((result.placed[1].x, result.placed[1].y), (4.0, 0.0));
        assert_eq!(result.unplaced.len(), 1);
        assert_eq!(result.unplaced[0].id, json!(3));
        assert!(!result.is_complete());
    }

    #[test]
    fn narrow_remainder_is_compacted_and_next_pallet_goes_on_top() {
        let pallets = vec![pallet(1, 3.0, 4.0, false), pallet(2, 3.0, 4.0, false)];
        let result = load_pallets(section(10.0, 6.0), pallets, no_rotation()).unwrap();

        assert_eq!(result.placed.len(), 2);
        assert_eq!((result.placed[0].x, result.placed[0].y), (0.0, 0.0));
        assert_eq!((result.placed[1].x, result.placed[1].y), (3.0, 0.0));
    }

    #[test]
    fn sorts_widest_first() {
        let pallets = vec![
            pallet(1, 2.0, 2.0, false),
            pallet(2, 2.0, 6.0, false),
            pallet(3, 2.0, 4.0, false),
        ];
        let result = load_pallets(section(20.0, 6.0), pallets, no_rotation()).unwrap();
        let ids: Vec<&Value> = result.placed.iter().map(|p| &p.pallet.id).collect();
        assert_eq!(ids, vec![&json!(2), &json!(3), &json!(1)]);
    }

    #[test]
    fn upright_pallet_is_turned_when_allowed() {
        // 8 deep, 2 wide in a 5-deep section only fits turned.
        let pallets = vec![pallet(1, 8.0, 2.0, true)];
        let result = load_pallets(section(5.0, 10.0), pallets, LoadOptions::default()).unwrap();

        assert_eq!(result.placed.len(), 1);
        let placed = &result.placed[0];
        assert!(placed.rotated);
        assert_eq!((placed.pallet.height, placed.pallet.width), (2.0, 8.0));
        assert!(result.summary.rotation_pass_selected);
    }

    #[test]
    fn pallet_without_rotation_flag_is_never_turned() {
        let pallets = vec![pallet(1, 8.0, 2.0, false)];
        let result = load_pallets(section(5.0, 10.0), pallets, LoadOptions::default()).unwrap();
        assert!(result.placed.is_empty());
        assert_eq!(result.unplaced.len(), 1);
    }

    #[test]
    fn global_rotation_switch_disables_turning() {
        let pallets = vec![pallet(1, 8.0, 2.0, true)];
        let result = load_pallets(section(5.0, 10.0), pallets, no_rotation()).unwrap();
        assert!(result.placed.is_empty());
        assert!(!result.summary.rotation_pass_selected);
    }

    #[test]
    fn orientation_follows_dominating_rating() {
        let map = HeightMap::new(10.0, 4.0, 0.0);
        let flat = pallet(1, 2.0, 4.0, true);
        let candidate = Candidate::normalized(&flat, true);
        // Current: (4, 0); turned 4x2: (1, 1). Neither dominates -> keep current.
        assert_eq!(choose_orientation(&map, &candidate, true), Orientation::Current);

        let long = pallet(2, 3.0, 5.0, true);
        let candidate = Candidate::normalized(&long, true);
        // 5 wide does not fit into 4; turned 5x3 does.
        assert_eq!(choose_orientation(&map, &candidate, true), Orientation::Turned);
        assert_eq!(choose_orientation(&map, &candidate, false), Orientation::Current);
    }

    #[test]
    fn opaque_attributes_survive_placement() {
        let pallets = vec![
            pallet(1, 4.0, 10.0, false)
                .with_attribute("label", json!("EUR"))
                .with_attribute("x", json!(99.0))
                .with_attribute("rotated", json!("yes")),
        ];
        let result = load_pallets(section(10.0, 10.0), pallets, no_rotation()).unwrap();
        let placed = &result.placed[0];
        assert_eq!(placed.pallet.attributes.get("label"), Some(&json!("EUR")));
        assert!(placed.pallet.attributes.get("x").is_none());
        assert!(placed.pallet.attributes.get("rotated").is_none());

        let value = serde_json::to_value(placed).unwrap();
        assert_eq!(value["x"], json!(0.0));
        assert_eq!(value["rotated"], json!(false));
    }

    #[test]
    fn pallets_without_id_are_numbered_by_input_position() {
        let raw = json!([
            {"height": 4.0, "width": 4.0},
            {"id": "EUR-7", "height": 4.0, "width": 6.0},
            {"height": 4.0, "width": 8.0}
        ]);
        let pallets: Vec<Pallet> = serde_json::from_value(raw).unwrap();
        let result = load_pallets(section(4.0, 8.0), pallets, no_rotation()).unwrap();

        assert_eq!(result.placed.len(), 1);
        assert_eq!(result.placed[0].pallet.id, json!(2));
        let unplaced: Vec<&Value> = result.unplaced.iter().map(|p| &p.id).collect();
        assert_eq!(unplaced, vec![&json!("EUR-7"), &json!(0)]);
    }

    #[test]
    fn center_loading_disabled_keeps_loading_from_the_walls() {
        let pallets: Vec<Pallet> = (0..6).map(|id| pallet(id, 2.0, 3.0, false)).collect();
        let options = LoadOptions::builder()
            .allow_rotation(false)
            .center_loading(false)
            .build();
        let result = load_pallets(section(4.0, 10.0), pallets, options).unwrap();

        // The 4-wide middle lane is folded away, so only the wall lanes are used.
        assert_eq!(result.placed.len(), 4);
        for placed in &result.placed {
            assert!(placed.y < EPSILON_GENERAL || placed.y + placed.pallet.width > 10.0 - EPSILON_GENERAL);
        }

        let pallets: Vec<Pallet> = (0..6).map(|id| pallet(id, 2.0, 3.0, false)).collect();
        let result = load_pallets(section(4.0, 10.0), pallets, no_rotation()).unwrap();
        assert_eq!(result.placed.len(), 6);
    }

    #[test]
    fn rejects_invalid_input_before_loading() {
        let bad_section = ContainerSection {
            height: 0.0,
            width: 10.0,
        };
        assert!(matches!(
            load_pallets(bad_section, vec![], LoadOptions::default()),
            Err(ValidationError::InvalidDimension(_))
        ));

        let bad_pallet = Pallet {
            id: json!(1),
            height: -1.0,
            width: 1.0,
            allow_rotation: false,
            attributes: Default::default(),
        };
        assert!(load_pallets(section(10.0, 10.0), vec![bad_pallet], LoadOptions::default()).is_err());

        let options = LoadOptions::builder().padding(-1.0).build();
        assert!(matches!(
            load_pallets(section(10.0, 10.0), vec![], options),
            Err(ValidationError::InvalidPadding(_))
        ));
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let result = load_pallets(section(10.0, 10.0), vec![], LoadOptions::default()).unwrap();
        assert!(result.placed.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.summary.utilization_percent, 0.0);
    }

    #[test]
    fn summary_reports_utilization() {
        let pallets = vec![pallet(1, 5.0, 10.0, false)];
        let result = load_pallets(section(10.0, 10.0), pallets, no_rotation()).unwrap();
        assert_eq!(result.summary.placed, 1);
        assert!((result.summary.used_area - 50.0).abs() < EPSILON_GENERAL);
        assert!((result.summary.utilization_percent - 50.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn progress_events_describe_both_passes() {
        let pallets = vec![pallet(1, 4.0, 10.0, true)];
        let mut events = Vec::new();
        load_pallets_with_progress(section(10.0, 10.0), pallets, LoadOptions::default(), |e| {
            events.push(e.clone())
        })
        .unwrap();

        let started = events
            .iter()
            .filter(|e| matches!(e, LoadEvent::PassStarted { .. }))
            .count();
        assert_eq!(started, 2);
        assert!(matches!(
            events.last(),
            Some(LoadEvent::Finished {
                placed: 1,
                unplaced: 0,
                rotation_pass_selected: true
            })
        ));

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], json!("PassStarted"));
    }

    fn pallets_strategy() -> impl Strategy<Value = Vec<Pallet>> {
        prop::collection::vec((1u32..12, 1u32..12, any::<bool>()), 0..25).prop_map(|dims| {
            dims.into_iter()
                .enumerate()
                .map(|(id, (h, w, rot))| pallet(id, h as f64, w as f64, rot))
                .collect()
        })
    }

    fn assert_valid_plan(
        section: &ContainerSection,
        input: &[Pallet],
        placed: &[PlacedPallet],
        padding: f64,
    ) {
        assert!(geometry::find_overlaps(placed).is_empty());
        for (i, a) in placed.iter().enumerate() {
            assert!(geometry::fits_in_section(a, section), "{:?} leaves the section", a);

            let original = input.iter().find(|p| p.id == a.pallet.id).unwrap();
            if a.rotated {
                assert!(original.allow_rotation, "pallet {} turned without permission", original.id);
                assert_eq!((a.pallet.height, a.pallet.width), (original.width, original.height));
            } else {
                assert_eq!((a.pallet.height, a.pallet.width), (original.height, original.width));
            }

            for b in placed.iter().skip(i + 1) {
                if let Some(gap) = geometry::depth_clearance(a, b) {
                    assert!(gap + EPSILON_GENERAL >= padding, "gap {} below padding", gap);
                }
            }
        }
    }

    proptest! {
        #[test]
        fn plans_are_valid(
            pallets in pallets_strategy(),
            height in 5u32..40,
            width in 5u32..30,
            padding in 0u32..3,
            center_loading in any::<bool>(),
        ) {
            let section = section(height as f64, width as f64);
            let options = LoadOptions::builder()
                .padding(padding as f64)
                .center_loading(center_loading)
                .build();
            let result = load_pallets(section, pallets.clone(), options).unwrap();

            prop_assert_eq!(result.placed.len() + result.unplaced.len(), pallets.len());
            assert_valid_plan(&section, &pallets, &result.placed, padding as f64);
        }

        #[test]
        fn two_pass_yield_is_monotone(
            pallets in pallets_strategy(),
            height in 5u32..40,
            width in 5u32..30,
            center_loading in any::<bool>(),
        ) {
            let section = section(height as f64, width as f64);
            let options = LoadOptions::builder().center_loading(center_loading).build();

            let with_rotation = single_pass(&section, &pallets, &options, true);
            let without_rotation = single_pass(&section, &pallets, &options, false);
            let result = load_pallets(section, pallets, options).unwrap();

            prop_assert!(result.placed.len() >= with_rotation.placed.len());
            prop_assert!(result.placed.len() >= without_rotation.placed.len());
        }
    }
}
