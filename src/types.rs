//! Value objects decoded from server responses. Owned solely by the
//! caller once returned.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored location. The server omits `location_id` on `get`
/// replies, so absent fields default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "location_id", default)]
    pub id: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub data: Value,
}

/// A location returned by a neighbors query, with its distance from the
/// query point in meters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Neighbor {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub distance: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_location_decodes_without_id() {
        let loc: Location = serde_json::from_str(r#"{"data":"loc2","lat":17,"lon":78}"#).unwrap();
        assert_eq!(loc.id, "");
        assert_eq!(loc.latitude, 17.0);
        assert_eq!(loc.longitude, 78.0);
        assert_eq!(loc.data, Value::String("loc2".to_string()));
    }

    #[test]
    fn test_neighbor_decodes_flattened() {
        let neighbors: Vec<Neighbor> =
            serde_json::from_str(r#"[{"data":"loc2","lat":12.99478,"lon":77.542687}]"#).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].location.latitude, 12.99478);
        assert_eq!(neighbors[0].distance, 0.0);
    }

    #[test]
    fn test_neighbor_distance_decodes() {
        let neighbor: Neighbor =
            serde_json::from_str(r#"{"location_id":"a","lat":1,"lon":2,"distance":42.5}"#).unwrap();
        assert_eq!(neighbor.location.id, "a");
        assert_eq!(neighbor.distance, 42.5);
    }
}
