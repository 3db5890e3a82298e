//! Parameter snapshots reported over the control channel.

use serde::Serialize;

/// Full description of one hosted parameter, as listed by `list_parameters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSnapshot {
    pub id: u32,
    pub title: String,
    pub units: String,
    pub normalized_value: f64,
    pub display_value: String,
    pub default_normalized_value: f64,
    pub step_count: i32,
    pub can_automate: bool,
}

/// Current value of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterValue {
    pub id: u32,
    pub normalized_value: f64,
    pub display_value: String,
}

/// Clamp a requested normalized value into `[0, 1]`.
///
/// Returns `None` for NaN and infinities.
pub fn clamp_normalized(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value.clamp(0.0, 1.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_normalized() {
        assert_eq!(clamp_normalized(1.5), Some(1.0));
        assert_eq!(clamp_normalized(-0.2), Some(0.0));
        assert_eq!(clamp_normalized(0.25), Some(0.25));
        assert_eq!(clamp_normalized(f64::NAN), None);
        assert_eq!(clamp_normalized(f64::INFINITY), None);
        assert_eq!(clamp_normalized(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = ParameterSnapshot {
            id: 3,
            title: "Gain".into(),
            units: "dB".into(),
            normalized_value: 0.5,
            display_value: "-6.0".into(),
            default_normalized_value: 0.75,
            step_count: 0,
            can_automate: true,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["normalizedValue"], 0.5);
        assert_eq!(json["defaultNormalizedValue"], 0.75);
        assert_eq!(json["stepCount"], 0);
        assert_eq!(json["canAutomate"], true);
        assert_eq!(json["displayValue"], "-6.0");
    }
}
