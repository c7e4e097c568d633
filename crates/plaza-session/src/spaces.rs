//! Space lookup: does a space exist, and how big is it?
//!
//! Spaces are created and stored by another service. The presence server
//! only reads their rectangular size, to pick a spawn cell at join time.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use plaza_protocol::{Position, SpaceId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SessionError;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Width × height of a space, in cells. Both are always at least 1.
///
/// Deserializes from either the `"100x200"` shorthand used by the space
/// service or an explicit `{"width": 100, "height": 200}` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DimensionsRepr")]
pub struct Dimensions {
    width: u32,
    height: u32,
}

impl Dimensions {
    /// Returns `None` if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Draws a cell uniformly at random with `0 ≤ x < width` and
    /// `0 ≤ y < height`.
    pub fn random_cell<R: Rng>(&self, rng: &mut R) -> Position {
        Position::new(
            i64::from(rng.random_range(0..self.width)),
            i64::from(rng.random_range(0..self.height)),
        )
    }

    /// Returns `true` if `position` lies inside the space.
    pub fn contains(&self, position: Position) -> bool {
        (0..i64::from(self.width)).contains(&position.x)
            && (0..i64::from(self.height)).contains(&position.y)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SessionError::InvalidDimensions(s.to_string());

        let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height).ok_or_else(invalid)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionsRepr {
    Text(String),
    Explicit { width: u32, height: u32 },
}

impl TryFrom<DimensionsRepr> for Dimensions {
    type Error = SessionError;

    fn try_from(repr: DimensionsRepr) -> Result<Self, Self::Error> {
        match repr {
            DimensionsRepr::Text(s) => s.parse(),
            DimensionsRepr::Explicit { width, height } => Self::new(width, height)
                .ok_or_else(|| SessionError::InvalidDimensions(format!("{width}x{height}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// SpaceDirectory
// ---------------------------------------------------------------------------

/// Resolves a space id to its dimensions.
///
/// Implementations return [`SessionError::SpaceNotFound`] for unknown ids
/// and [`SessionError::Lookup`] when the backing store fails.
pub trait SpaceDirectory: Send + Sync + 'static {
    fn lookup(
        &self,
        space_id: &SpaceId,
    ) -> impl Future<Output = Result<Dimensions, SessionError>> + Send;
}

/// An in-memory [`SpaceDirectory`], filled at startup.
///
/// Loaded from a JSON catalog like:
///
/// ```json
/// [
///   { "id": "lobby", "dimensions": "100x200" },
///   { "id": "atrium", "dimensions": { "width": 20, "height": 20 } }
/// ]
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSpaces {
    spaces: HashMap<SpaceId, Dimensions>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    id: SpaceId,
    dimensions: Dimensions,
}

impl StaticSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a space. Builder-style.
    pub fn with_space(mut self, space_id: SpaceId, dimensions: Dimensions) -> Self {
        self.insert(space_id, dimensions);
        self
    }

    /// Adds or replaces a space.
    pub fn insert(&mut self, space_id: SpaceId, dimensions: Dimensions) {
        self.spaces.insert(space_id, dimensions);
    }

    /// Parses a JSON catalog.
    ///
    /// # Errors
    /// [`SessionError::InvalidDimensions`] if the JSON is malformed or any
    /// entry has a zero/unparseable size.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)
            .map_err(|e| SessionError::InvalidDimensions(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.id, entry.dimensions))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}

impl FromIterator<(SpaceId, Dimensions)> for StaticSpaces {
    fn from_iter<I: IntoIterator<Item = (SpaceId, Dimensions)>>(iter: I) -> Self {
        Self {
            spaces: iter.into_iter().collect(),
        }
    }
}

impl SpaceDirectory for StaticSpaces {
    async fn lookup(&self, space_id: &SpaceId) -> Result<Dimensions, SessionError> {
        self.spaces
            .get(space_id)
            .copied()
            .ok_or_else(|| SessionError::SpaceNotFound(space_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_new_rejects_zero() {
        assert!(Dimensions::new(0, 5).is_none());
        assert!(Dimensions::new(5, 0).is_none());
        assert!(Dimensions::new(1, 1).is_some());
    }

    #[test]
    fn test_dimensions_parse_shorthand() {
        let dims: Dimensions = "100x200".parse().unwrap();
        assert_eq!((dims.width(), dims.height()), (100, 200));
        assert_eq!(dims.to_string(), "100x200");

        let dims: Dimensions = " 3 X 4 ".parse().unwrap();
        assert_eq!((dims.width(), dims.height()), (3, 4));
    }

    #[test]
    fn test_dimensions_parse_rejects_bad_input() {
        for bad in ["100", "x200", "100x", "0x5", "-1x5", "axb", ""] {
            assert!(
                matches!(bad.parse::<Dimensions>(), Err(SessionError::InvalidDimensions(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_random_cell_stays_in_bounds() {
        let dims = Dimensions::new(10, 3).unwrap();
        let mut rng = rand::rng();
        for _ in 0..1_000 {
            let cell = dims.random_cell(&mut rng);
            assert!(dims.contains(cell), "{cell} escaped {dims}");
        }
    }

    #[test]
    fn test_random_cell_on_single_cell_space_is_origin() {
        let dims = Dimensions::new(1, 1).unwrap();
        assert_eq!(dims.random_cell(&mut rand::rng()), Position::new(0, 0));
    }

    #[test]
    fn test_contains_edges() {
        let dims = Dimensions::new(10, 10).unwrap();
        assert!(dims.contains(Position::new(0, 0)));
        assert!(dims.contains(Position::new(9, 9)));
        assert!(!dims.contains(Position::new(10, 0)));
        assert!(!dims.contains(Position::new(0, -1)));
    }

    #[test]
    fn test_catalog_accepts_both_dimension_forms() {
        let spaces = StaticSpaces::from_json(
            r#"[
                { "id": "lobby", "dimensions": "100x200" },
                { "id": "atrium", "dimensions": { "width": 20, "height": 30 } }
            ]"#,
        )
        .unwrap();
        assert_eq!(spaces.len(), 2);
    }

    #[test]
    fn test_catalog_rejects_zero_size() {
        let result = StaticSpaces::from_json(r#"[{ "id": "void", "dimensions": "0x10" }]"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_lookup_found_and_not_found() {
        let spaces = StaticSpaces::new()
            .with_space(SpaceId::new("R1"), Dimensions::new(10, 10).unwrap());

        let dims = spaces.lookup(&SpaceId::new("R1")).await.unwrap();
        assert_eq!(dims.width(), 10);

        let missing = spaces.lookup(&SpaceId::new("R9")).await;
        assert!(matches!(missing, Err(SessionError::SpaceNotFound(id)) if id == SpaceId::new("R9")));
    }
}
