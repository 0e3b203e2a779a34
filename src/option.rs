/// Rows fetched per remote round trip when nothing else applies.
pub const DEFAULT_ROWS_CACHED: i32 = 1024;

/// Runtime configuration for a table scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub(crate) caching_override: Option<i32>,
    pub(crate) cache_blocks: bool,
    pub(crate) suggested_max_caching: Option<i32>,
    pub(crate) default_caching: i32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            caching_override: None,
            cache_blocks: false,
            suggested_max_caching: None,
            default_caching: DEFAULT_ROWS_CACHED,
        }
    }
}

impl ScanOptions {
    /// Explicit rows-per-fetch, taking precedence over every other source.
    pub fn caching(self, rows: i32) -> Self {
        ScanOptions {
            caching_override: Some(rows),
            ..self
        }
    }

    /// Whether the store should keep scanned blocks in its block cache.
    pub fn cache_blocks(self, cache_blocks: bool) -> Self {
        ScanOptions {
            cache_blocks,
            ..self
        }
    }

    /// Caching hint from the planner, capped at the default.
    pub fn suggested_max_caching(self, rows: i32) -> Self {
        ScanOptions {
            suggested_max_caching: Some(rows),
            ..self
        }
    }

    /// Fallback rows-per-fetch, also the ceiling for the planner hint.
    pub fn default_caching(self, default_caching: i32) -> Self {
        ScanOptions {
            default_caching,
            ..self
        }
    }

    /// Rows the remote scanner fetches per round trip.
    pub fn rows_cached(&self) -> i32 {
        if let Some(rows) = self.caching_override.filter(|rows| *rows > 0) {
            return rows;
        }
        match self.suggested_max_caching {
            Some(hint) if hint > 0 && hint < self.default_caching => hint,
            _ => self.default_caching,
        }
    }

    pub(crate) fn cache_blocks_enabled(&self) -> bool {
        self.cache_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_when_positive() {
        let options = ScanOptions::default().caching(7).suggested_max_caching(3);
        assert_eq!(options.rows_cached(), 7);
    }

    #[test]
    fn non_positive_override_is_ignored() {
        let options = ScanOptions::default().caching(0).suggested_max_caching(3);
        assert_eq!(options.rows_cached(), 3);
        let options = ScanOptions::default().caching(-5);
        assert_eq!(options.rows_cached(), DEFAULT_ROWS_CACHED);
    }

    #[test]
    fn hint_is_clamped_to_default() {
        let options = ScanOptions::default().suggested_max_caching(10_000);
        assert_eq!(options.rows_cached(), DEFAULT_ROWS_CACHED);
        let options = ScanOptions::default()
            .default_caching(50)
            .suggested_max_caching(20);
        assert_eq!(options.rows_cached(), 20);
        let options = ScanOptions::default().suggested_max_caching(0);
        assert_eq!(options.rows_cached(), DEFAULT_ROWS_CACHED);
    }

    #[test]
    fn cache_blocks_defaults_off() {
        assert!(!ScanOptions::default().cache_blocks_enabled());
        assert!(ScanOptions::default()
            .cache_blocks(true)
            .cache_blocks_enabled());
    }
}
