//! Source-keyed TTL table

use std::collections::HashMap;
use std::time::Duration;

pub const GITHUB_TTL: Duration = Duration::from_secs(10 * 60);
pub const OPEN_WEATHER_TTL: Duration = Duration::from_secs(5 * 60);
pub const UPTIME_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Flat `source → TTL` table with a fallback
#[derive(Debug, Clone, PartialEq)]
pub struct TtlPolicy {
    by_source: HashMap<String, Duration>,
    default: Duration,
}

impl TtlPolicy {
    pub fn new(by_source: HashMap<String, Duration>, default: Duration) -> Self {
        Self { by_source, default }
    }

    /// TTL applied to metrics of `source`
    pub fn ttl_for(&self, source: &str) -> Duration {
        self.by_source.get(source).copied().unwrap_or(self.default)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(
            HashMap::from([
                ("GitHub".to_string(), GITHUB_TTL),
                ("OpenWeatherMap".to_string(), OPEN_WEATHER_TTL),
                ("UptimeChecker".to_string(), UPTIME_TTL),
            ]),
            DEFAULT_TTL,
        )
    }
}
