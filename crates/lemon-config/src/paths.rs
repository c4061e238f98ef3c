//! Config-file path resolution (§6: "path resolution for the config
//! file" — an ambient concern, implemented here rather than left as an
//! unspecified external collaborator).

use std::path::PathBuf;

use directories::ProjectDirs;

/// Resolve the config file to load: an explicit `-c` override if given,
/// otherwise `$XDG_CONFIG_HOME/lemonctl/lemonctl.ini` (or the platform
/// equivalent via the `directories` crate).
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    ProjectDirs::from("", "", "lemonctl").map(|dirs| dirs.config_dir().join("lemonctl.ini"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_returned_unchanged() {
        let explicit = PathBuf::from("/tmp/custom.ini");
        assert_eq!(
            resolve_config_path(Some(explicit.clone())),
            Some(explicit)
        );
    }

    #[test]
    fn default_path_ends_with_expected_filename() {
        if let Some(path) = resolve_config_path(None) {
            assert_eq!(path.file_name().unwrap(), "lemonctl.ini");
        }
    }
}
