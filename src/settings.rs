use std::time::Duration;

use serde_json::Value;

/// Per-button settings as stored by the deck software.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSettings {
    /// Redraw period in milliseconds; 0 means "use the default".
    pub refresh_time: u64,
}

impl ButtonSettings {
    pub fn from_value(settings: &Value) -> Self {
        Self {
            refresh_time: lenient_u64(settings.get("refresh_time")),
        }
    }

    pub fn period(&self, default: Duration) -> Duration {
        if self.refresh_time == 0 {
            default
        } else {
            Duration::from_millis(self.refresh_time)
        }
    }
}

/// The `settings` object of an event payload, or an empty object.
pub fn settings_object(payload: &Value) -> Value {
    match payload.get("settings") {
        Some(settings @ Value::Object(_)) => settings.clone(),
        _ => Value::Object(Default::default()),
    }
}

/// Font size from a title-parameters payload; 0 when absent.
pub fn font_size(payload: &Value) -> u32 {
    let nested = payload
        .get("titleParameters")
        .and_then(|params| params.get("fontSize"));
    let size = lenient_u64(nested.or_else(|| payload.get("fontSize")));
    u32::try_from(size).unwrap_or(u32::MAX)
}

fn lenient_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|n| n.is_finite() && *n >= 0.0)
                    .map(|n| n as u64)
            })
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
