//! Multi-resolution spatial keys for geo-located endpoints.
//!
//! A coordinate is mapped to its leaf S2 cell, then to the ancestor of that
//! cell at every level in `[min_level, max_level]`. The ancestor ids are joined
//! into one composite key so the write layer can fan the edge out to every
//! enclosing cell.

use s2::cellid::CellID;
use s2::latlng::LatLng;

use crate::config::SpatialConfig;
use crate::error::{LoadError, Result};

/// Separator between cell ids in a composite spatial key.
pub const CELL_KEY_SEPARATOR: char = ',';

/// Maps a coordinate to hierarchical cell ids.
pub trait CellIndexer: Send + Sync {
    /// Ancestor cell ids of the point, coarsest first, one per level in
    /// `min_level..=max_level`.
    fn ancestor_cells(&self, lat: f64, lng: f64, min_level: u8, max_level: u8) -> Result<Vec<u64>>;
}

/// S2 cell hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct S2CellIndexer;

impl CellIndexer for S2CellIndexer {
    fn ancestor_cells(&self, lat: f64, lng: f64, min_level: u8, max_level: u8) -> Result<Vec<u64>> {
        if !(lat.is_finite() && lng.is_finite())
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(LoadError::InvalidCoordinate { lat, lng });
        }
        let leaf = CellID::from(&LatLng::from_degrees(lat, lng));
        Ok((min_level..=max_level)
            .map(|level| leaf.parent(u64::from(level)).0)
            .collect())
    }
}

/// Build the composite key for one coordinate.
pub fn composite_key(
    indexer: &dyn CellIndexer,
    lat: f64,
    lng: f64,
    config: &SpatialConfig,
) -> Result<String> {
    let cells = indexer.ancestor_cells(lat, lng, config.min_level, config.max_level)?;
    let mut key = String::with_capacity(cells.len() * 20);
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            key.push(CELL_KEY_SEPARATOR);
        }
        key.push_str(&cell.to_string());
    }
    Ok(key)
}

/// Split a composite key back into its cell ids (as written).
pub fn split_composite_key(key: &str) -> impl Iterator<Item = &str> {
    key.split(CELL_KEY_SEPARATOR).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestor_chain() {
        let cells = S2CellIndexer
            .ancestor_cells(37.7749, -122.4194, 10, 18)
            .unwrap();
        assert_eq!(cells.len(), 9);
        for (i, pair) in cells.windows(2).enumerate() {
            let coarse = CellID(pair[0]);
            let fine = CellID(pair[1]);
            assert!(coarse.is_valid() && fine.is_valid());
            assert_eq!(coarse.level(), 10 + i as u64);
            assert_eq!(fine.level(), 11 + i as u64);
            assert_eq!(fine.parent(coarse.level()), coarse);
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            S2CellIndexer.ancestor_cells(91.0, 0.0, 10, 12),
            Err(LoadError::InvalidCoordinate { .. })
        ));
        assert!(S2CellIndexer.ancestor_cells(0.0, f64::NAN, 10, 12).is_err());
    }

    #[test]
    fn test_composite_key_round_trip() {
        let config = SpatialConfig::new("lat", "lng").with_levels(10, 12);
        let key = composite_key(&S2CellIndexer, 48.8566, 2.3522, &config).unwrap();
        let parts: Vec<&str> = split_composite_key(&key).collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.parse::<u64>().is_ok()));
    }

    #[test]
    fn test_default_range_has_ten_levels() {
        let config = SpatialConfig::new("lat", "lng");
        let key = composite_key(&S2CellIndexer, 0.0, 0.0, &config).unwrap();
        assert_eq!(split_composite_key(&key).count(), 10);
    }
}
