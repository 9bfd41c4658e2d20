//! Simulated bus sensor readings
//!
//! The reading itself carries no range checks. The bounds below belong to the
//! dashboard widgets that edit it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VentilationQuality {
    #[default]
    Good,
    Moderate,
    Poor,
}

impl VentilationQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            VentilationQuality::Good => "Good",
            VentilationQuality::Moderate => "Moderate",
            VentilationQuality::Poor => "Poor",
        }
    }

    pub fn all() -> [VentilationQuality; 3] {
        [
            VentilationQuality::Good,
            VentilationQuality::Moderate,
            VentilationQuality::Poor,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "good" => Some(VentilationQuality::Good),
            "moderate" => Some(VentilationQuality::Moderate),
            "poor" => Some(VentilationQuality::Poor),
            _ => None,
        }
    }
}

impl fmt::Display for VentilationQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CameraObservation {
    #[default]
    #[serde(rename = "No visible issues")]
    NoIssues,
    #[serde(rename = "Steam near engine")]
    SteamNearEngine,
    #[serde(rename = "Blocked air vents")]
    BlockedVents,
}

impl CameraObservation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraObservation::NoIssues => "No visible issues",
            CameraObservation::SteamNearEngine => "Steam near engine",
            CameraObservation::BlockedVents => "Blocked air vents",
        }
    }

    pub fn all() -> [CameraObservation; 3] {
        [
            CameraObservation::NoIssues,
            CameraObservation::SteamNearEngine,
            CameraObservation::BlockedVents,
        ]
    }

    /// Accepts the wire value or the short CLI names (`none`, `steam`, `blocked`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "no visible issues" => Some(CameraObservation::NoIssues),
            "steam" | "steam near engine" => Some(CameraObservation::SteamNearEngine),
            "blocked" | "blocked air vents" => Some(CameraObservation::BlockedVents),
            _ => None,
        }
    }
}

impl fmt::Display for CameraObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshot of the simulated sensors. Temperatures are in °C, coolant in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub engine_temperature: f64,
    pub cabin_temperature: f64,
    pub outside_temperature: f64,
    pub coolant_level: f64,
    pub ventilation_quality: VentilationQuality,
    pub camera_observations: CameraObservation,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            engine_temperature: 90.0,
            cabin_temperature: 22.0,
            outside_temperature: 20.0,
            coolant_level: 80.0,
            ventilation_quality: VentilationQuality::Good,
            camera_observations: CameraObservation::NoIssues,
        }
    }
}

/// Editable rows of the sensor panel, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField {
    EngineTemperature,
    CabinTemperature,
    OutsideTemperature,
    CoolantLevel,
    Ventilation,
    Camera,
}

impl SensorField {
    pub fn all() -> [SensorField; 6] {
        [
            SensorField::EngineTemperature,
            SensorField::CabinTemperature,
            SensorField::OutsideTemperature,
            SensorField::CoolantLevel,
            SensorField::Ventilation,
            SensorField::Camera,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            SensorField::EngineTemperature => "Engine Temperature",
            SensorField::CabinTemperature => "Cabin Temperature",
            SensorField::OutsideTemperature => "Outside Temperature",
            SensorField::CoolantLevel => "Coolant Level",
            SensorField::Ventilation => "Ventilation Quality",
            SensorField::Camera => "Camera Observations",
        }
    }

    /// Slider bounds `(min, max, step)`. Outside temperature is a free numeric entry.
    pub fn bounds(&self) -> Option<(f64, f64, f64)> {
        match self {
            SensorField::EngineTemperature => Some((50.0, 150.0, 1.0)),
            SensorField::CabinTemperature => Some((10.0, 50.0, 1.0)),
            SensorField::CoolantLevel => Some((0.0, 100.0, 5.0)),
            SensorField::OutsideTemperature | SensorField::Ventilation | SensorField::Camera => None,
        }
    }

    pub fn next(&self) -> SensorField {
        let fields = Self::all();
        let i = fields.iter().position(|f| f == self).unwrap_or(0);
        fields[(i + 1).min(fields.len() - 1)]
    }

    pub fn prev(&self) -> SensorField {
        let fields = Self::all();
        let i = fields.iter().position(|f| f == self).unwrap_or(0);
        fields[i.saturating_sub(1)]
    }
}

fn cycle<T: Copy + PartialEq>(items: &[T], current: T, steps: i32) -> T {
    let len = items.len() as i32;
    let i = items.iter().position(|x| *x == current).unwrap_or(0) as i32;
    items[(i + steps).rem_euclid(len) as usize]
}

impl SensorReading {
    /// Move a field by `steps` widget increments (negative moves down).
    /// Sliders clamp to their bounds; enum rows wrap around.
    pub fn adjust(&mut self, field: SensorField, steps: i32) {
        let nudge = |value: f64| -> f64 {
            match field.bounds() {
                Some((min, max, step)) => (value + step * steps as f64).clamp(min, max),
                None => value + steps as f64,
            }
        };

        match field {
            SensorField::EngineTemperature => self.engine_temperature = nudge(self.engine_temperature),
            SensorField::CabinTemperature => self.cabin_temperature = nudge(self.cabin_temperature),
            SensorField::OutsideTemperature => self.outside_temperature = nudge(self.outside_temperature),
            SensorField::CoolantLevel => self.coolant_level = nudge(self.coolant_level),
            SensorField::Ventilation => {
                self.ventilation_quality =
                    cycle(&VentilationQuality::all(), self.ventilation_quality, steps);
            }
            SensorField::Camera => {
                self.camera_observations =
                    cycle(&CameraObservation::all(), self.camera_observations, steps);
            }
        }
    }

    /// Display value of a field as the panel labels show it.
    pub fn display_value(&self, field: SensorField) -> String {
        match field {
            SensorField::EngineTemperature => format!("{}°C", self.engine_temperature),
            SensorField::CabinTemperature => format!("{}°C", self.cabin_temperature),
            SensorField::OutsideTemperature => format!("{}°C", self.outside_temperature),
            SensorField::CoolantLevel => format!("{}%", self.coolant_level),
            SensorField::Ventilation => self.ventilation_quality.to_string(),
            SensorField::Camera => self.camera_observations.to_string(),
        }
    }

    /// Fraction of the slider range a field occupies, for gauges.
    pub fn gauge_ratio(&self, field: SensorField) -> Option<f64> {
        let (min, max, _) = field.bounds()?;
        let value = match field {
            SensorField::EngineTemperature => self.engine_temperature,
            SensorField::CabinTemperature => self.cabin_temperature,
            SensorField::CoolantLevel => self.coolant_level,
            _ => return None,
        };
        Some(((value - min) / (max - min)).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_start_values() {
        let reading = SensorReading::default();
        assert_eq!(reading.engine_temperature, 90.0);
        assert_eq!(reading.cabin_temperature, 22.0);
        assert_eq!(reading.coolant_level, 80.0);
        assert_eq!(reading.outside_temperature, 20.0);
        assert_eq!(reading.ventilation_quality, VentilationQuality::Good);
        assert_eq!(reading.camera_observations, CameraObservation::NoIssues);
    }

    #[test]
    fn enum_wire_values() {
        assert_eq!(serde_json::to_string(&VentilationQuality::Moderate).unwrap(), "\"Moderate\"");
        assert_eq!(
            serde_json::to_string(&CameraObservation::SteamNearEngine).unwrap(),
            "\"Steam near engine\""
        );
        let parsed: CameraObservation = serde_json::from_str("\"Blocked air vents\"").unwrap();
        assert_eq!(parsed, CameraObservation::BlockedVents);
    }

    #[test]
    fn sliders_clamp_to_widget_bounds() {
        let mut reading = SensorReading::default();
        reading.adjust(SensorField::CoolantLevel, 10);
        assert_eq!(reading.coolant_level, 100.0);
        reading.adjust(SensorField::CoolantLevel, -3);
        assert_eq!(reading.coolant_level, 85.0);
        reading.adjust(SensorField::EngineTemperature, -100);
        assert_eq!(reading.engine_temperature, 50.0);
        reading.adjust(SensorField::CabinTemperature, 40);
        assert_eq!(reading.cabin_temperature, 50.0);
    }

    #[test]
    fn outside_temperature_is_unbounded() {
        let mut reading = SensorReading::default();
        reading.adjust(SensorField::OutsideTemperature, -50);
        assert_eq!(reading.outside_temperature, -30.0);
        assert_eq!(reading.display_value(SensorField::OutsideTemperature), "-30°C");
    }

    #[test]
    fn enum_rows_wrap_around() {
        let mut reading = SensorReading::default();
        reading.adjust(SensorField::Ventilation, -1);
        assert_eq!(reading.ventilation_quality, VentilationQuality::Poor);
        reading.adjust(SensorField::Camera, 4);
        assert_eq!(reading.camera_observations, CameraObservation::SteamNearEngine);
    }

    #[test]
    fn field_navigation_stops_at_ends() {
        assert_eq!(SensorField::EngineTemperature.prev(), SensorField::EngineTemperature);
        assert_eq!(SensorField::Camera.next(), SensorField::Camera);
        assert_eq!(SensorField::CabinTemperature.next(), SensorField::OutsideTemperature);
    }

    #[test]
    fn gauge_ratio_spans_slider_range() {
        let reading = SensorReading::default();
        assert_eq!(reading.gauge_ratio(SensorField::EngineTemperature), Some(0.4));
        assert_eq!(reading.gauge_ratio(SensorField::Ventilation), None);
    }
}
