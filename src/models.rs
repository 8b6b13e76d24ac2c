use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    PaidSocial,
    PaidSearch,
    ShortVideo,
    Commerce,
}

impl Platform {
    pub fn parse(value: &str) -> Option<Platform> {
        match value {
            "paid-social" => Some(Platform::PaidSocial),
            "paid-search" => Some(Platform::PaidSearch),
            "short-video" => Some(Platform::ShortVideo),
            "commerce" => Some(Platform::Commerce),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::PaidSocial => "paid-social",
            Platform::PaidSearch => "paid-search",
            Platform::ShortVideo => "short-video",
            Platform::Commerce => "commerce",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub platform: Platform,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct DailyMetric {
    pub channel_id: Uuid,
    pub date: NaiveDate,
    pub spend: f64,
    pub revenue: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub frequency: f64,
}

impl DailyMetric {
    pub fn roas(&self) -> f64 {
        safe_ratio(self.revenue, self.spend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativeStatus {
    Active,
    Paused,
}

impl CreativeStatus {
    pub fn parse(value: &str) -> Option<CreativeStatus> {
        match value {
            "active" => Some(CreativeStatus::Active),
            "paused" => Some(CreativeStatus::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Creative {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub name: String,
    pub status: CreativeStatus,
    pub launched_on: NaiveDate,
}

/// Per-day observation for a single creative, used by fatigue detection.
#[derive(Debug, Clone)]
pub struct CreativeDailyMetric {
    pub creative_id: Uuid,
    pub date: NaiveDate,
    pub spend: f64,
    pub revenue: f64,
    pub impressions: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub frequency: f64,
}

/// Customers acquired within one calendar month, tracked for lifetime value
/// at fixed horizons. Append-only historical facts; never mutated here.
#[derive(Debug, Clone)]
pub struct Cohort {
    pub month: String,
    pub channel: String,
    pub customer_count: i64,
    pub total_revenue: f64,
    pub avg_order_value: f64,
    pub repeat_rate: f64,
    pub ltv_30d: f64,
    pub ltv_60d: f64,
    pub ltv_90d: f64,
    pub ltv_180d: Option<f64>,
}

/// The trailing analysis window for one brain cycle. The end date is
/// supplied by the caller so a cycle is reproducible regardless of when it
/// actually runs.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisWindow {
    pub end: NaiveDate,
    pub days: u32,
}

impl AnalysisWindow {
    pub fn trailing(end: NaiveDate, days: u32) -> AnalysisWindow {
        AnalysisWindow {
            end,
            days: days.max(1),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.end - Duration::days(self.days as i64 - 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date <= self.end
    }

    /// Most recent 14 days, the "recent" half of detector comparisons.
    pub fn recent_start(&self) -> NaiveDate {
        self.end - Duration::days(13)
    }

    /// Days 15-28 back, the detector baseline span.
    pub fn baseline_range(&self) -> (NaiveDate, NaiveDate) {
        (self.end - Duration::days(27), self.end - Duration::days(14))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Warning accumulated while scrubbing input rows. One bad row is excluded
/// and reported here rather than failing the whole organization's cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub scope: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(scope: &str, message: String) -> Diagnostic {
        Diagnostic {
            scope: scope.to_string(),
            message,
        }
    }
}

/// revenue / spend with the zero-spend rule applied everywhere a ratio is
/// derived: zero denominator yields 0.0, never a fault.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_ratio_handles_zero_denominator() {
        assert_eq!(safe_ratio(100.0, 0.0), 0.0);
        assert_eq!(safe_ratio(100.0, -5.0), 0.0);
        assert!((safe_ratio(300.0, 100.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn window_spans_inclusive_dates() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 30).unwrap();
        let window = AnalysisWindow::trailing(end, 30);
        assert_eq!(window.start(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(window.contains(window.start()));
        assert!(window.contains(end));
        assert!(!window.contains(end + Duration::days(1)));
    }

    #[test]
    fn window_detector_split_is_fourteen_days_each() {
        let end = NaiveDate::from_ymd_opt(2026, 3, 30).unwrap();
        let window = AnalysisWindow::trailing(end, 30);
        let (base_start, base_end) = window.baseline_range();
        assert_eq!((window.end - window.recent_start()).num_days(), 13);
        assert_eq!((base_end - base_start).num_days(), 13);
        assert_eq!((window.recent_start() - base_end).num_days(), 1);
    }

    #[test]
    fn platform_parse_round_trips() {
        for value in ["paid-social", "paid-search", "short-video", "commerce"] {
            let platform = Platform::parse(value).unwrap();
            assert_eq!(platform.as_str(), value);
        }
        assert!(Platform::parse("billboard").is_none());
    }
}
