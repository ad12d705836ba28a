use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`.
///
/// Adjacent windows built with [`Window::previous`] partition time with no
/// overlap and no gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct WindowBounds {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<WindowBounds> for Window {
    type Error = String;

    fn try_from(b: WindowBounds) -> Result<Self, Self::Error> {
        if b.start > b.end {
            return Err(format!("window start {} is after end {}", b.start, b.end));
        }
        Ok(Self {
            start: b.start,
            end: b.end,
        })
    }
}

impl Window {
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "window start must not be after end");
        Self { start, end }
    }

    /// The window of length `length` ending (exclusively) at `end`.
    #[must_use]
    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    /// The window of the same length immediately before this one.
    #[must_use]
    pub fn previous(&self) -> Self {
        Self {
            start: self.start - self.length(),
            end: self.start,
        }
    }

    /// Shift the whole window back by `offset`.
    #[must_use]
    pub fn shifted_back(&self, offset: Duration) -> Self {
        Self {
            start: self.start - offset,
            end: self.end - offset,
        }
    }

    #[must_use]
    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Dashboard time-range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowPreset {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl WindowPreset {
    #[must_use]
    pub fn days(self) -> i64 {
        match self {
            WindowPreset::Day => 1,
            WindowPreset::ThreeDays => 3,
            WindowPreset::Week => 7,
            WindowPreset::Month => 30,
            WindowPreset::Quarter => 90,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WindowPreset::Day => "24h",
            WindowPreset::ThreeDays => "3d",
            WindowPreset::Week => "7d",
            WindowPreset::Month => "30d",
            WindowPreset::Quarter => "90d",
        }
    }

    /// Parse `24h`, `1d`, `3d`, `7d`, `30d` or `90d`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "24h" | "1d" => Some(WindowPreset::Day),
            "3d" => Some(WindowPreset::ThreeDays),
            "7d" => Some(WindowPreset::Week),
            "30d" => Some(WindowPreset::Month),
            "90d" => Some(WindowPreset::Quarter),
            _ => None,
        }
    }

    #[must_use]
    pub fn window_ending(self, end: DateTime<Utc>) -> Window {
        Window::trailing(end, Duration::days(self.days()))
    }
}

impl std::fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    #[test]
    fn deserialize_rejects_inverted_bounds() {
        let ok: Window = serde_json::from_value(serde_json::json!({
            "start": "2026-03-01T00:00:00Z",
            "end": "2026-03-02T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(ok, Window::new(at(0), at(24)));

        let err = serde_json::from_value::<Window>(serde_json::json!({
            "start": "2026-03-02T00:00:00Z",
            "end": "2026-03-01T00:00:00Z",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("is after end"));
    }

    #[test]
    fn window_is_half_open() {
        let w = Window::new(at(0), at(24));
        assert!(w.contains(at(0)));
        assert!(w.contains(at(23)));
        assert!(!w.contains(at(24)));
    }

    #[test]
    fn adjacent_windows_partition_every_instant() {
        let now = at(48);
        let current = Window::trailing(now, Duration::hours(24));
        let previous = current.previous();
        assert_eq!(previous.end, current.start);

        for minutes in (0..=(48 * 60)).step_by(7) {
            let t = now - Duration::minutes(minutes);
            let hits = [current.contains(t), previous.contains(t)]
                .iter()
                .filter(|b| **b)
                .count();
            if t == now || t < previous.start {
                assert_eq!(hits, 0, "{t} is outside both windows");
            } else {
                assert_eq!(hits, 1, "{t} must fall into exactly one window");
            }
        }
    }

    #[test]
    fn split_point_belongs_to_later_window() {
        let now = at(48);
        let current = Window::trailing(now, Duration::hours(24));
        let split = current.start;
        assert!(current.contains(split));
        assert!(!current.previous().contains(split));
    }

    #[test]
    fn shifted_back_keeps_length() {
        let w = Window::trailing(at(200), Duration::days(1));
        let last_week = w.shifted_back(Duration::days(7));
        assert_eq!(last_week.length(), w.length());
        assert_eq!(last_week.end, at(200 - 7 * 24));
    }

    #[test]
    fn preset_parse_accepts_dashboard_labels() {
        assert_eq!(WindowPreset::parse("24h"), Some(WindowPreset::Day));
        assert_eq!(WindowPreset::parse("90d"), Some(WindowPreset::Quarter));
        assert_eq!(WindowPreset::parse("2w"), None);
        assert_eq!(WindowPreset::Week.window_ending(at(0)).length(), Duration::days(7));
    }
}
