use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_APP_ID: &str = "default";
pub const DEFAULT_AUTOSAVE_MS: u64 = 900;
const AUTOSAVE_MS_RANGE: std::ops::RangeInclusive<u64> = 50..=60_000;

/// Process-level settings read once at startup.
///
/// | Variable                 | Default   |
/// |--------------------------|-----------|
/// | `WALKCLASSD_WORKSPACE`   | unset     |
/// | `WALKCLASSD_APP_ID`      | `default` |
/// | `WALKCLASSD_AUTOSAVE_MS` | `900`     |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub app_id: String,
    pub autosave_debounce: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            app_id: DEFAULT_APP_ID.to_string(),
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_MS),
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let workspace = get("WALKCLASSD_WORKSPACE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let app_id = get("WALKCLASSD_APP_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.app_id);

        let autosave_debounce = match get("WALKCLASSD_AUTOSAVE_MS") {
            None => defaults.autosave_debounce,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if AUTOSAVE_MS_RANGE.contains(&ms) => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(value = %raw, "invalid WALKCLASSD_AUTOSAVE_MS, using default");
                    defaults.autosave_debounce
                }
            },
        };

        Self {
            workspace,
            app_id,
            autosave_debounce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(DaemonConfig::from_lookup(lookup(&[])), DaemonConfig::default());
    }

    #[test]
    fn reads_and_validates_values() {
        let cfg = DaemonConfig::from_lookup(lookup(&[
            ("WALKCLASSD_WORKSPACE", "/tmp/ws"),
            ("WALKCLASSD_APP_ID", " school1 "),
            ("WALKCLASSD_AUTOSAVE_MS", "250"),
        ]));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cfg.app_id, "school1");
        assert_eq!(cfg.autosave_debounce, Duration::from_millis(250));

        let cfg = DaemonConfig::from_lookup(lookup(&[("WALKCLASSD_AUTOSAVE_MS", "5")]));
        assert_eq!(cfg.autosave_debounce, Duration::from_millis(DEFAULT_AUTOSAVE_MS));
    }
}
