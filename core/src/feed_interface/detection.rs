use crate::prelude::Coordinate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric field as reported upstream: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Numeric {
    /// Parsed value; `None` for anything that is not a finite number.
    pub fn value(&self) -> Option<f64> {
        let parsed = match self {
            Numeric::Number(v) => Some(*v),
            Numeric::Text(text) => text.trim().parse::<f64>().ok(),
            Numeric::Other(_) => None,
        };
        parsed.filter(|v| v.is_finite())
    }
}

impl From<f64> for Numeric {
    fn from(value: f64) -> Self {
        Numeric::Number(value)
    }
}

impl From<&str> for Numeric {
    fn from(value: &str) -> Self {
        Numeric::Text(value.to_string())
    }
}

fn resolve(field: Option<&Numeric>) -> Option<f64> {
    field.and_then(Numeric::value)
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Secondary point of interest reported alongside an object (e.g. a waypoint).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<Numeric>,
    #[serde(default, alias = "lon", skip_serializing_if = "Option::is_none")]
    pub lng: Option<Numeric>,
}

/// Nested telemetry block carried by newer camera firmware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<Numeric>,
    #[serde(default, alias = "lon", skip_serializing_if = "Option::is_none")]
    pub lng: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetPoint>,
}

/// One tracked entity inside a detection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(deserialize_with = "string_or_number")]
    pub obj_id: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<Numeric>,
    #[serde(default, alias = "lon", skip_serializing_if = "Option::is_none")]
    pub lng: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Telemetry>,
}

impl DetectedObject {
    pub fn new(obj_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            obj_id: obj_id.into(),
            category: category.into(),
            lat: None,
            lng: None,
            speed: None,
            telemetry: None,
        }
    }

    pub fn with_position(mut self, lat: impl Into<Numeric>, lng: impl Into<Numeric>) -> Self {
        self.lat = Some(lat.into());
        self.lng = Some(lng.into());
        self
    }

    pub fn with_speed(mut self, speed: impl Into<Numeric>) -> Self {
        self.speed = Some(speed.into());
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Direct field first, then the telemetry block.
    pub fn latitude(&self) -> Option<f64> {
        resolve(self.lat.as_ref())
            .or_else(|| resolve(self.telemetry.as_ref().and_then(|t| t.lat.as_ref())))
    }

    pub fn longitude(&self) -> Option<f64> {
        resolve(self.lng.as_ref())
            .or_else(|| resolve(self.telemetry.as_ref().and_then(|t| t.lng.as_ref())))
    }

    /// Resolved position, only when both axes resolve.
    pub fn position(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude()?, self.longitude()?))
    }

    pub fn speed_mps(&self) -> Option<f64> {
        resolve(self.speed.as_ref())
            .or_else(|| resolve(self.telemetry.as_ref().and_then(|t| t.speed.as_ref())))
    }

    pub fn altitude_m(&self) -> Option<f64> {
        resolve(self.telemetry.as_ref().and_then(|t| t.alt.as_ref()))
    }

    pub fn target(&self) -> Option<Coordinate> {
        let target = self.telemetry.as_ref()?.target.as_ref()?;
        Some(Coordinate::new(
            resolve(target.lat.as_ref())?,
            resolve(target.lng.as_ref())?,
        ))
    }
}

/// One sighting batch reported by a camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cam_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
}

impl DetectionEvent {
    pub fn new(
        id: impl Into<String>,
        cam_id: impl Into<String>,
        timestamp: impl Into<String>,
        objects: Vec<DetectedObject>,
    ) -> Self {
        Self {
            id: id.into(),
            cam_id: cam_id.into(),
            timestamp: timestamp.into(),
            image_path: None,
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_and_numbers_both_resolve() {
        let object: DetectedObject = serde_json::from_str(
            r#"{"obj_id":"obj_001","type":"drone","lat":"14.3","lng":101.2,"speed":"12.5"}"#,
        )
        .unwrap();
        assert_eq!(object.position(), Some(Coordinate::new(14.3, 101.2)));
        assert_eq!(object.speed_mps(), Some(12.5));
    }

    #[test]
    fn missing_or_garbage_coordinates_yield_no_position() {
        let object: DetectedObject =
            serde_json::from_str(r#"{"obj_id":"a","type":"drone","lat":"14.3"}"#).unwrap();
        assert_eq!(object.latitude(), Some(14.3));
        assert_eq!(object.position(), None);

        let garbage: DetectedObject = serde_json::from_str(
            r#"{"obj_id":"b","lat":"north","lng":true,"speed":null}"#,
        )
        .unwrap();
        assert_eq!(garbage.position(), None);
        assert_eq!(garbage.speed_mps(), None);
    }

    #[test]
    fn direct_fields_take_precedence_over_telemetry() {
        let object: DetectedObject = serde_json::from_str(
            r#"{
                "obj_id": 7,
                "lat": 14.0,
                "telemetry": {
                    "lat": 15.0, "lng": "101.5", "alt": 120, "speed": 9,
                    "target": {"lat": 14.5, "lng": 101.6}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(object.obj_id, "7");
        assert_eq!(object.position(), Some(Coordinate::new(14.0, 101.5)));
        assert_eq!(object.speed_mps(), Some(9.0));
        assert_eq!(object.altitude_m(), Some(120.0));
        assert_eq!(object.target(), Some(Coordinate::new(14.5, 101.6)));
    }

    #[test]
    fn event_decodes_with_numeric_ids() {
        let event: DetectionEvent = serde_json::from_str(
            r#"{"id":42,"cam_id":"offensive","timestamp":"2024-05-01T10:00:00Z",
                "image_path":"/img/42.jpg","objects":[{"obj_id":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(event.id, "42");
        assert_eq!(event.objects.len(), 1);
        assert_eq!(event.image_path.as_deref(), Some("/img/42.jpg"));
    }
}
