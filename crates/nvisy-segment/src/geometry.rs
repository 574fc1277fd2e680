//! Page geometry and label identity.
//!
//! A label is identified by the page it sits on and its pixel bounding box.
//! Rendering surfaces exchange this identity as the joined string
//! `page-x0-y0-x1-y1`. Internally it is a composite value with structural
//! equality, so `1.0` and `1` name the same coordinate regardless of how the
//! producer formatted it. The string form is available through [`Display`]
//! and [`FromStr`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, SegmentError};

/// Separator used by the textual label id form.
const KEY_SEPARATOR: char = '-';

/// Axis-aligned pixel bounding box `[x0, y0, x1, y1]`.
///
/// Coordinates are always finite. Negative zero is normalized to zero so that
/// equality and hashing agree with numeric comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox([f64; 4]);

impl BoundingBox {
    /// Creates a bounding box from its corner coordinates.
    ///
    /// # Errors
    ///
    /// Returns an error if any coordinate is NaN or infinite.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self> {
        Self::try_from([x0, y0, x1, y1])
    }

    /// Left edge.
    #[inline]
    pub fn x0(&self) -> f64 {
        self.0[0]
    }

    /// Top edge.
    #[inline]
    pub fn y0(&self) -> f64 {
        self.0[1]
    }

    /// Right edge.
    #[inline]
    pub fn x1(&self) -> f64 {
        self.0[2]
    }

    /// Bottom edge.
    #[inline]
    pub fn y1(&self) -> f64 {
        self.0[3]
    }

    /// Returns the coordinates as an array.
    #[inline]
    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }

    fn bits(&self) -> [u64; 4] {
        self.0.map(f64::to_bits)
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = SegmentError;

    fn try_from(coords: [f64; 4]) -> Result<Self> {
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(SegmentError::invalid_label_key(
                format!("{coords:?}"),
                "bounding box coordinates must be finite",
            ));
        }

        // -0.0 and 0.0 compare equal but differ in their bit patterns.
        Ok(Self(coords.map(|c| if c == 0.0 { 0.0 } else { c })))
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.0
    }
}

impl PartialEq for BoundingBox {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Composite identity of a label: page number plus bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelKey {
    /// Page number (1-indexed).
    pub page: u32,
    /// Pixel bounding box on that page.
    pub bbox: BoundingBox,
}

impl LabelKey {
    /// Creates a new label key.
    pub fn new(page: u32, bbox: BoundingBox) -> Self {
        Self { page, bbox }
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x0, y0, x1, y1] = self.bbox.as_array();
        write!(f, "{}-{x0}-{y0}-{x1}-{y1}", self.page)
    }
}

impl FromStr for LabelKey {
    type Err = SegmentError;

    /// Parses the `page-x0-y0-x1-y1` form.
    ///
    /// Coordinates are pixel offsets and therefore non-negative; a leading
    /// minus sign would be indistinguishable from the separator.
    fn from_str(input: &str) -> Result<Self> {
        let fields: Vec<&str> = input.trim().split(KEY_SEPARATOR).collect();
        let [page, x0, y0, x1, y1] = fields.as_slice() else {
            return Err(SegmentError::invalid_label_key(
                input,
                "expected five '-' separated fields",
            ));
        };

        let page = page
            .parse::<u32>()
            .map_err(|_| SegmentError::invalid_label_key(input, "page is not an integer"))?;

        let mut coords = [0.0; 4];
        for (slot, field) in coords.iter_mut().zip([x0, y0, x1, y1]) {
            *slot = field
                .parse::<f64>()
                .map_err(|_| SegmentError::invalid_label_key(input, "coordinate is not a number"))?;
        }

        let bbox = BoundingBox::try_from(coords)
            .map_err(|_| SegmentError::invalid_label_key(input, "coordinate is not finite"))?;

        Ok(Self::new(page, bbox))
    }
}

impl TryFrom<String> for LabelKey {
    type Error = SegmentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<LabelKey> for String {
    fn from(key: LabelKey) -> Self {
        key.to_string()
    }
}
