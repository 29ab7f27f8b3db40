//! Data models for the pallet loading plan.
//!
//! This module defines the fundamental data structures of a loading run:
//! - `ContainerSection`: The cross-section of the vehicle or container body
//! - `Pallet`: An item to be loaded, with opaque caller attributes
//! - `PlacedPallet`: A pallet with its assigned position and orientation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{Footprint, Rect, validation};

/// Validation error for loading input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid padding: {0}")]
    InvalidPadding(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    validation::validate_dimension(value, name).map_err(ValidationError::InvalidDimension)
}

/// Validates a clearance value at the boundary.
pub fn validate_padding(value: f64) -> Result<(), ValidationError> {
    validation::validate_padding(value).map_err(ValidationError::InvalidPadding)
}

/// Cross-section of the loading space.
///
/// # Fields
/// * `height` - Usable depth of the body (the stacking axis of the height map)
/// * `width` - Usable width of the body
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerSection {
    #[schema(example = 1360.0)]
    pub height: f64,
    #[schema(example = 245.0)]
    pub width: f64,
}

impl ContainerSection {
    /// Creates a new section after validating both dimensions.
    ///
    /// # Examples
    /// ```
    /// use pallet_loader::model::ContainerSection;
    ///
    /// assert!(ContainerSection::new(1360.0, 245.0).is_ok());
    /// assert!(ContainerSection::new(0.0, 245.0).is_err());
    /// ```
    pub fn new(height: f64, width: f64) -> Result<Self, ValidationError> {
        let section = Self { height, width };
        section.validate()?;
        Ok(section)
    }

    /// Re-checks a section that was built without `new` (e.g. deserialized).
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.height, "Container height")?;
        validate_dimension(self.width, "Container width")?;
        Ok(())
    }

    pub fn area(&self) -> f64 {
        self.height * self.width
    }
}

/// An item to be loaded.
///
/// Every field besides the dimensions and the rotation flag is kept in
/// `attributes` and handed back untouched on the placed pallet. The keys
/// `x`, `y` and `rotated` belong to the placement and are dropped from
/// `attributes` when the pallet is placed.
///
/// `id` may be any JSON value. Pallets without one are numbered by their
/// position in the input when loading starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pallet {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub id: Value,
    pub height: f64,
    pub width: f64,
    #[serde(default)]
    pub allow_rotation: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Pallet {
    /// Creates a new pallet with validation and no extra attributes.
    ///
    /// # Examples
    /// ```
    /// use pallet_loader::model::Pallet;
    ///
    /// assert!(Pallet::new(1, 120.0, 80.0, true).is_ok());
    /// assert!(Pallet::new(1, -120.0, 80.0, true).is_err());
    /// ```
    pub fn new(
        id: impl Into<Value>,
        height: f64,
        width: f64,
        allow_rotation: bool,
    ) -> Result<Self, ValidationError> {
        let pallet = Self {
            id: id.into(),
            height,
            width,
            allow_rotation,
            attributes: Map::new(),
        };
        pallet.validate()?;
        Ok(pallet)
    }

    /// Attaches an opaque attribute (Builder pattern light).
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.height, &format!("Height of pallet {}", self.id))?;
        validate_dimension(self.width, &format!("Width of pallet {}", self.id))?;
        Ok(())
    }

    /// Returns the pallet turned by 90 degrees.
    pub fn rotated(&self) -> Self {
        Self {
            height: self.width,
            width: self.height,
            ..self.clone()
        }
    }
}

impl Footprint for Pallet {
    fn height(&self) -> f64 {
        self.height
    }

    fn width(&self) -> f64 {
        self.width
    }
}

/// A pallet with its position in the container section.
///
/// # Fields
/// * `pallet` - The pallet as loaded; height and width are already swapped when `rotated`
/// * `x` - Depth coordinate of the near edge
/// * `y` - Lateral coordinate of the left edge
/// * `rotated` - Whether the pallet was turned relative to its input
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedPallet {
    #[serde(flatten)]
    pub pallet: Pallet,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotated: bool,
}

impl PlacedPallet {
    /// Rectangle covered by the pallet itself.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.pallet.height, self.pallet.width)
    }
}

impl Footprint for PlacedPallet {
    fn height(&self) -> f64 {
        self.pallet.height
    }

    fn width(&self) -> f64 {
        self.pallet.width
    }
}
