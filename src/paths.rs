//! Path utilities for locating the local data directory.

use std::env;
use std::path::PathBuf;

/// Directory name used under the platform data dir.
pub const APP_DIR_NAME: &str = "screenreader-cv";

/// Overrides every other data-dir source when set.
pub const DATA_DIR_ENV: &str = "SCREENREADER_CV_DATA_DIR";

/// Gets the user's home directory.
///
/// Uses `HOME` everywhere, falling back to `USERPROFILE` on Windows.
pub fn get_home_dir() -> Result<PathBuf, String> {
    if let Ok(home) = env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(profile) = env::var("USERPROFILE") {
            return Ok(PathBuf::from(profile));
        }
    }

    Err("Could not determine home directory: HOME and USERPROFILE are not set".to_string())
}

/// Resolves where the app envelope lives.
///
/// Order: `$SCREENREADER_CV_DATA_DIR`, then `configured` (the `data_dir` config
/// field), then `<platform data dir>/screenreader-cv`, then
/// `${HOME}/.screenreader-cv`.
pub fn resolve_data_dir(configured: Option<&str>) -> Result<PathBuf, String> {
    let from_env = env::var(DATA_DIR_ENV).ok();
    resolve_data_dir_from(from_env.as_deref(), configured)
}

fn resolve_data_dir_from(
    from_env: Option<&str>,
    configured: Option<&str>,
) -> Result<PathBuf, String> {
    if let Some(dir) = non_blank(from_env).or_else(|| non_blank(configured)) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(base) = dirs::data_dir() {
        return Ok(base.join(APP_DIR_NAME));
    }
    Ok(get_home_dir()?.join(format!(".{APP_DIR_NAME}")))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_beats_config() {
        let dir = resolve_data_dir_from(Some("/tmp/env"), Some("/tmp/cfg")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/env"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let dir = resolve_data_dir_from(Some("  "), Some("/tmp/cfg")).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/cfg"));

        let fallback = resolve_data_dir_from(None, Some("")).unwrap();
        assert!(fallback.ends_with(APP_DIR_NAME) || fallback.ends_with(".screenreader-cv"));
    }
}
