use crate::error::{PipelineError, Result};
use crate::utils::constants::{DISTRICT_PROPERTY, PROVINCE_PROPERTY, REGION_ID_PROPERTY};
use geo::MultiPolygon;
use geojson::{Feature, GeoJson};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// One administrative region from the boundaries file
#[derive(Debug, Clone)]
pub struct Boundary {
    pub region_id: String,
    pub province: Option<String>,
    pub district: Option<String>,
    pub polygon: MultiPolygon<f64>,
}

pub struct BoundaryReader {
    id_property: String,
}

impl BoundaryReader {
    pub fn new() -> Self {
        Self {
            id_property: REGION_ID_PROPERTY.to_string(),
        }
    }

    pub fn with_id_property(id_property: impl Into<String>) -> Self {
        Self {
            id_property: id_property.into(),
        }
    }

    pub fn read_boundaries(&self, path: &Path) -> Result<Vec<Boundary>> {
        let text = std::fs::read_to_string(path)?;
        self.parse_boundaries(&text)
    }

    /// Parse a FeatureCollection of polygon regions. Features without a usable
    /// polygon or region id are skipped with a warning.
    pub fn parse_boundaries(&self, text: &str) -> Result<Vec<Boundary>> {
        let geojson: GeoJson = text.parse()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(PipelineError::InvalidFormat(
                "Boundaries file must be a GeoJSON FeatureCollection".to_string(),
            ));
        };

        let total = collection.features.len();
        let boundaries: Vec<Boundary> = collection
            .features
            .into_iter()
            .filter_map(|feature| self.parse_feature(feature))
            .collect();

        info!(regions = boundaries.len(), features = total, "Loaded boundaries");
        Ok(boundaries)
    }

    fn parse_feature(&self, feature: Feature) -> Option<Boundary> {
        let Some(region_id) = feature.property(&self.id_property).and_then(property_string) else {
            warn!(property = %self.id_property, "Skipping boundary without region id");
            return None;
        };
        let province = feature.property(PROVINCE_PROPERTY).and_then(property_string);
        let district = feature.property(DISTRICT_PROPERTY).and_then(property_string);

        let Some(polygon) = feature.geometry.and_then(to_multipolygon) else {
            warn!(region = %region_id, "Skipping boundary without polygon geometry");
            return None;
        };

        Some(Boundary {
            region_id,
            province,
            district,
            polygon,
        })
    }
}

impl Default for BoundaryReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Region ids are compared as strings whatever their JSON type
fn property_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"ID_CORR": 80101, "Provincia": "Panamá", "Corregimiento": "San Felipe"},
                "geometry": {"type": "Polygon", "coordinates": [[[-80,8],[-79,8],[-79,9],[-80,9],[-80,8]]]}
            },
            {
                "type": "Feature",
                "properties": {"ID_CORR": "40101", "Provincia": "Chiriquí", "Corregimiento": "David"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[-83,8],[-82,8],[-82,9],[-83,9],[-83,8]]]]}
            },
            {
                "type": "Feature",
                "properties": {"ID_CORR": "99"},
                "geometry": {"type": "Point", "coordinates": [-80, 8]}
            },
            {
                "type": "Feature",
                "properties": {"Provincia": "Colón"},
                "geometry": {"type": "Polygon", "coordinates": [[[-80,9],[-79,9],[-79,10],[-80,10],[-80,9]]]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_boundaries() {
        let boundaries = BoundaryReader::new().parse_boundaries(BOUNDARIES).unwrap();

        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].region_id, "80101");
        assert_eq!(boundaries[0].province.as_deref(), Some("Panamá"));
        assert_eq!(boundaries[1].district.as_deref(), Some("David"));
        assert_eq!(boundaries[1].polygon.0.len(), 1);
    }

    #[test]
    fn test_custom_id_property() {
        let boundaries = BoundaryReader::with_id_property("Corregimiento")
            .parse_boundaries(BOUNDARIES)
            .unwrap();

        let ids: Vec<_> = boundaries.iter().map(|b| b.region_id.as_str()).collect();
        assert_eq!(ids, vec!["San Felipe", "David"]);
    }

    #[test]
    fn test_rejects_non_collection() {
        let text = r#"{"type": "Point", "coordinates": [-80, 8]}"#;
        assert!(BoundaryReader::new().parse_boundaries(text).is_err());
    }
}
