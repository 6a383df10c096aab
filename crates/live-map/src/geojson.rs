//! GeoJSON export of a rendered frame, for piping into other map tools.

use serde_json::{Value, json};

use crate::{MapFrame, Marker};

impl MapFrame {
    /// `FeatureCollection` with one `Point` per marker followed by the route
    /// as a `LineString`. Coordinates are `[lng, lat]`.
    pub fn to_geojson(&self) -> Value {
        let mut features: Vec<Value> = self.markers.iter().map(marker_feature).collect();
        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": self
                    .route
                    .points
                    .iter()
                    .map(|point| point.to_lng_lat())
                    .collect::<Vec<_>>(),
            },
            "properties": {
                "distance": self.distance,
                "duration": self.duration,
                "stroke": self.route.color,
                "stroke-width": self.route.weight,
                "stroke-opacity": self.route.opacity,
                "step": self.current_step.as_ref().map(|step| json!({
                    "instruction": step.instruction,
                    "distance": step.distance,
                    "duration": step.duration,
                })),
            },
        }));

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

fn marker_feature(marker: &Marker) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": marker.position.to_lng_lat(),
        },
        "properties": {
            "role": marker.role,
            "rotation": marker.rotation,
        },
    })
}

#[cfg(test)]
mod tests {
    use backend_api::RouteStep;
    use geo_core::Coordinate;

    use crate::{MarkerRole, Polyline, Viewport};

    use super::*;

    fn frame() -> MapFrame {
        MapFrame {
            viewport: Viewport {
                center: Coordinate::new(12.925, 77.62),
                zoom: 13,
            },
            attribution: String::new(),
            tiles: Vec::new(),
            markers: vec![
                Marker {
                    role: MarkerRole::Counterparty,
                    position: Coordinate::new(12.95, 77.64),
                    rotation: 0.0,
                },
                Marker {
                    role: MarkerRole::Mover,
                    position: Coordinate::new(12.90, 77.60),
                    rotation: 38.5,
                },
            ],
            route: Polyline {
                points: vec![Coordinate::new(12.90, 77.60), Coordinate::new(12.95, 77.64)],
                color: "#4285F4".into(),
                weight: 5.0,
                opacity: 0.8,
            },
            distance: "6.8 km".into(),
            duration: "18 mins".into(),
            current_step: None,
            revision: 1,
        }
    }

    #[test]
    fn exports_markers_then_route() {
        let doc = frame().to_geojson();
        assert_eq!(doc["type"], "FeatureCollection");

        let features = doc["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["properties"]["role"], "counterparty");
        assert_eq!(features[1]["properties"]["role"], "mover");
        assert_eq!(features[1]["properties"]["rotation"], 38.5);
        assert_eq!(features[2]["geometry"]["type"], "LineString");
        assert_eq!(features[2]["properties"]["distance"], "6.8 km");
    }

    #[test]
    fn coordinates_are_longitude_first() {
        let doc = frame().to_geojson();
        assert_eq!(
            doc["features"][1]["geometry"]["coordinates"],
            json!([77.60, 12.90])
        );
        assert_eq!(
            doc["features"][2]["geometry"]["coordinates"][1],
            json!([77.64, 12.95])
        );
    }

    #[test]
    fn empty_route_is_still_a_line_feature() {
        let mut empty = frame();
        empty.route.points.clear();
        let doc = empty.to_geojson();
        assert_eq!(doc["features"][2]["geometry"]["coordinates"], json!([]));
    }

    #[test]
    fn route_feature_carries_current_step() {
        let mut with_step = frame();
        with_step.current_step = Some(RouteStep {
            instruction: "Turn left onto Sarjapur Road".into(),
            distance: "1.2 km".into(),
            duration: "4 mins".into(),
            location: None,
        });

        let doc = with_step.to_geojson();
        let step = &doc["features"][2]["properties"]["step"];
        assert_eq!(step["instruction"], "Turn left onto Sarjapur Road");
        assert_eq!(step["distance"], "1.2 km");

        assert!(frame().to_geojson()["features"][2]["properties"]["step"].is_null());
    }
}
