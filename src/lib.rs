//! Skyline-based pallet loading planner.
//!
//! Pallets are placed onto the floor of a container section (a truck body,
//! trailer or sea container) by tracking the loaded depth across the width as
//! a height map. The planner runs one pass with pallets as given and, when
//! rotation is allowed, a second pass with rotation trials, then returns the
//! better plan.
//!
//! ```
//! use pallet_loader::loader::{LoadOptions, load_pallets};
//! use pallet_loader::model::{ContainerSection, Pallet};
//!
//! let section = ContainerSection::new(10.0, 10.0).unwrap();
//! let pallets = vec![Pallet::new(1, 4.0, 10.0, false).unwrap()];
//! let result = load_pallets(section, pallets, LoadOptions::default()).unwrap();
//! assert!(result.is_complete());
//! ```

pub mod api;
pub mod config;
pub mod geometry;
pub mod height_map;
pub mod loader;
pub mod model;
pub mod types;
