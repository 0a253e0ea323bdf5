// SPDX-License-Identifier: MIT

//! Output formatting shared by the task-mode handlers.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Parsed from the `output_format` config key; defaults to `Text` for
    /// anything else rather than failing the whole invocation over a
    /// cosmetic setting.
    pub fn from_config_str(s: Option<&str>) -> Self {
        match s {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format a unix-seconds timestamp as relative time (e.g. "5s", "2m", "1h", "3d").
pub fn format_time_ago(epoch_sec: u64) -> String {
    if epoch_sec == 0 {
        return "-".to_string();
    }
    let now_sec = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let elapsed = now_sec.saturating_sub(epoch_sec);
    if elapsed < 60 {
        format!("{elapsed}s")
    } else if elapsed < 3600 {
        format!("{}m", elapsed / 60)
    } else if elapsed < 86400 {
        format!("{}h", elapsed / 3600)
    } else {
        format!("{}d", elapsed / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_epoch_renders_as_dash() {
        assert_eq!(format_time_ago(0), "-");
    }

    #[test]
    fn unknown_format_string_defaults_to_text() {
        assert_eq!(OutputFormat::from_config_str(Some("xml")), OutputFormat::Text);
        assert_eq!(OutputFormat::from_config_str(None), OutputFormat::Text);
        assert_eq!(OutputFormat::from_config_str(Some("json")), OutputFormat::Json);
    }
}
