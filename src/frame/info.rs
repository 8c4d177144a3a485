//! Info row: date, time, and optional weather summary.

use crate::charset::{self, grapheme_len};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Current conditions shown on the info row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Degrees Fahrenheit
    pub temperature: i32,
    /// Short condition, e.g. "RAIN"
    #[serde(default)]
    pub condition: Option<String>,
}

/// Format the info line, e.g. `THU OCT 16 9:05AM 72F`.
///
/// Weather parts are appended only while they fit in `width`; the date/time part is
/// truncated if it does not.
pub fn format_info_line(
    timestamp: &DateTime<FixedOffset>,
    weather: Option<&WeatherSnapshot>,
    width: usize,
) -> String {
    let mut line = timestamp
        .format("%a %b %-d %-I:%M%p")
        .to_string()
        .to_ascii_uppercase();

    if let Some(weather) = weather {
        let with_temp = format!("{} {}F", line, weather.temperature);
        if grapheme_len(&with_temp) <= width {
            line = with_temp;
            if let Some(condition) = weather.condition.as_deref() {
                let condition: String = condition
                    .to_ascii_uppercase()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
                    .collect();
                let condition = condition.trim();
                let with_condition = format!("{} {}", line, condition);
                if !condition.is_empty() && grapheme_len(&with_condition) <= width {
                    line = with_condition;
                }
            }
        }
    }

    charset::truncate_graphemes(&line, width)
}
