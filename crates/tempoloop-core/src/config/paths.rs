//! Path utilities for tempoloop configuration files
//!
//! Provides a standard location for the looper's config file.

use std::path::PathBuf;

/// Get the default config directory
///
/// Returns: `~/.config/tempoloop`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tempoloop")
}

/// Get the default config file path for a given filename
///
/// Returns: `~/.config/tempoloop/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_tempoloop() {
        let path = default_config_dir();
        assert!(path.ends_with("tempoloop"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("test.yaml");
        assert!(path.ends_with("test.yaml"));
    }
}
