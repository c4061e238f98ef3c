//! INI config loading: maps a config file on disk into a typed
//! [`lemon_core::State`] (§4.G, expanded concrete schema).

use std::path::{Path, PathBuf};

use ini::Ini;
use lemon_core::{
    ActionCommands, Align, Block, BlockDefaults, BlockStyle, Fonts, Geometry, Lemon, LemonColors,
    Mode, Preferences, Spark, State,
};

use crate::error::ConfigError;

/// Load a [`State`] from the config file named by `prefs.config_path`
/// (falling back to the XDG default), honoring `prefs.bar_section` and
/// `prefs.run_if_empty`.
pub fn load(prefs: Preferences) -> Result<State, ConfigError> {
    check_display()?;

    let path = crate::paths::resolve_config_path(prefs.config_path.clone())
        .ok_or_else(|| ConfigError::NotFound(PathBuf::from("<unresolvable>")))?;
    if !path.is_file() {
        return Err(ConfigError::NotFound(path));
    }

    let ini = Ini::load_from_file(&path).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    let bar = ini
        .section(Some(prefs.bar_section.as_str()))
        .ok_or_else(|| ConfigError::MissingBarSection(prefs.bar_section.clone()))?;

    let lemon = load_lemon(bar);
    let mut state = State::new(lemon.clone(), prefs.clone());

    for token in lemon_core::format::dedup_preserving_first_index(lemon_core::format::tokenize_format(
        &lemon.format,
    )) {
        let mut block = Block::new(token.sid.clone(), token.align);
        if let Some(section) = ini.section(Some(token.sid.as_str())) {
            apply_block_section(&mut block, section)?;
        }
        let block_id = state.push_block(block);

        let trigger = state.block(block_id).trigger.clone();
        if state.block(block_id).mode == Mode::Sparked {
            if let Some(trigger) = trigger {
                let spark_id = state.push_spark(Spark::new(block_id, trigger));
                state.block_mut(block_id).spark = Some(spark_id);
            } else {
                return Err(lemon_core::LemonError::SparkedBlockMissingTrigger {
                    sid: state.block(block_id).sid.clone(),
                }
                .into());
            }
        }
    }

    if state.blocks.is_empty() && !state.prefs.run_if_empty {
        return Err(ConfigError::NoBlocksWithoutRunIfEmpty);
    }

    Ok(state)
}

fn check_display() -> Result<(), ConfigError> {
    std::env::var("DISPLAY")
        .map(|_| ())
        .map_err(|_| ConfigError::MissingEnv("DISPLAY".to_string()))
}

fn load_lemon(bar: &ini::Properties) -> Lemon {
    let mut lemon = Lemon::default();
    if let Some(bin) = bar.get("bin") {
        lemon.bin = bin.to_string();
    }
    if let Some(name) = bar.get("name") {
        lemon.name = name.to_string();
    }
    lemon.geometry = Geometry {
        width: get_u32(bar, "width").unwrap_or(0),
        height: get_u32(bar, "height").unwrap_or(0),
        x: get_i32(bar, "x").unwrap_or(0),
        y: get_i32(bar, "y").unwrap_or(0),
    };
    lemon.colors = LemonColors {
        fg: bar.get("foreground").map(str::to_string),
        bg: bar.get("background").map(str::to_string),
        line_color: bar.get("line-color").map(str::to_string),
        underline_color: bar.get("underline-color").map(str::to_string),
    };
    lemon.line_width = get_u32(bar, "line-width").unwrap_or(0);
    lemon.bottom = get_bool(bar, "bottom").unwrap_or(false);
    lemon.force_docking = get_bool(bar, "force-docking").unwrap_or(false);
    lemon.fonts = Fonts {
        block: split_list(bar.get("font-block")),
        label: split_list(bar.get("font-label")),
        affix: split_list(bar.get("font-affix")),
    };
    lemon.window_name = bar.get("name").map(str::to_string);
    lemon.defaults = BlockDefaults {
        fg: bar.get("foreground").map(str::to_string),
        bg: bar.get("background").map(str::to_string),
        label_fg: None,
        label_bg: None,
        affix_fg: None,
        affix_bg: None,
        line_color: bar.get("line-color").map(str::to_string),
        overline: get_bool(bar, "overline").unwrap_or(false),
        underline: get_bool(bar, "underline").unwrap_or(false),
    };
    lemon.prefix = bar.get("prefix").unwrap_or_default().to_string();
    lemon.suffix = bar.get("suffix").unwrap_or_default().to_string();
    lemon.format = bar.get("format").unwrap_or_default().to_string();
    lemon
}

fn apply_block_section(block: &mut Block, section: &ini::Properties) -> Result<(), ConfigError> {
    if let Some(bin) = section.get("bin") {
        block.bin = bin.to_string();
    }
    if let Some(mode) = section.get("mode") {
        block.mode = mode.parse()?;
    }
    if let Some(reload) = section.get("reload") {
        block.reload = reload.parse().unwrap_or(block.reload);
    }
    block.consume = get_bool(section, "consume").unwrap_or(block.consume);
    block.trigger = section.get("trigger").map(str::to_string);
    if let Some(align) = section.get("align") {
        block.align = align.parse()?;
    }

    block.style = BlockStyle {
        fg: section.get("fg").map(str::to_string),
        bg: section.get("bg").map(str::to_string),
        label_fg: section.get("label-fg").map(str::to_string),
        label_bg: section.get("label-bg").map(str::to_string),
        label_text: section.get("label").map(str::to_string),
        affix_fg: section.get("affix-fg").map(str::to_string),
        affix_bg: section.get("affix-bg").map(str::to_string),
        line_color: section.get("line-color").map(str::to_string),
        overline: get_bool(section, "overline").unwrap_or(false),
        underline: get_bool(section, "underline").unwrap_or(false),
        offset: get_i32(section, "offset").unwrap_or(0),
        padding: get_i32(section, "padding").unwrap_or(0),
    };

    block.actions = ActionCommands {
        lmb: section.get("lmb").map(str::to_string),
        mmb: section.get("mmb").map(str::to_string),
        rmb: section.get("rmb").map(str::to_string),
        scroll_up: section.get("scroll-up").map(str::to_string),
        scroll_down: section.get("scroll-down").map(str::to_string),
    };

    Ok(())
}

fn get_u32(section: &ini::Properties, key: &str) -> Option<u32> {
    section.get(key).and_then(|v| v.parse().ok())
}

fn get_i32(section: &ini::Properties, key: &str) -> Option<i32> {
    section.get(key).and_then(|v| v.parse().ok())
}

fn get_bool(section: &ini::Properties, key: &str) -> Option<bool> {
    section.get(key).map(|v| matches!(v, "1" | "true" | "yes" | "on"))
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default()
}

/// Exists only so tests can exercise `load` against a file on disk instead of
/// the resolved default path.
pub fn load_from_path(path: &Path, prefs: Preferences) -> Result<State, ConfigError> {
    load(Preferences {
        config_path: Some(path.to_path_buf()),
        ..prefs
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ini(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn with_display<T>(f: impl FnOnce() -> T) -> T {
        // SAFETY: tests run single-threaded within this module's own
        // process-wide env var; no other test in this crate reads DISPLAY
        // concurrently.
        unsafe { std::env::set_var("DISPLAY", ":0") };
        f()
    }

    #[test]
    fn loads_bar_and_blocks_in_format_order() {
        with_display(|| {
            let file = write_ini(
                "[bar]\nformat = clock | volume\n\n[clock]\nmode = timed\nreload = 1.0\n\n[volume]\nmode = once\n",
            );
            let state = load_from_path(file.path(), Preferences::default()).unwrap();
            assert_eq!(state.blocks.len(), 2);
            assert_eq!(state.blocks[0].sid, "clock");
            assert_eq!(state.blocks[0].align, Align::Left);
            assert_eq!(state.blocks[1].sid, "volume");
            assert_eq!(state.blocks[1].align, Align::Center);
        });
    }

    #[test]
    fn missing_bar_section_is_an_error() {
        with_display(|| {
            let file = write_ini("[other]\nformat = x\n");
            let err = load_from_path(file.path(), Preferences::default()).unwrap_err();
            assert!(matches!(err, ConfigError::MissingBarSection(_)));
        });
    }

    #[test]
    fn empty_format_without_run_if_empty_is_an_error() {
        with_display(|| {
            let file = write_ini("[bar]\nformat =\n");
            let err = load_from_path(file.path(), Preferences::default()).unwrap_err();
            assert!(matches!(err, ConfigError::NoBlocksWithoutRunIfEmpty));
        });
    }

    #[test]
    fn empty_format_with_run_if_empty_succeeds() {
        with_display(|| {
            let file = write_ini("[bar]\nformat =\n");
            let prefs = Preferences {
                run_if_empty: true,
                ..Preferences::default()
            };
            let state = load_from_path(file.path(), prefs).unwrap();
            assert!(state.blocks.is_empty());
        });
    }

    #[test]
    fn sparked_block_without_trigger_is_an_error() {
        with_display(|| {
            let file = write_ini("[bar]\nformat = vpn\n\n[vpn]\nmode = sparked\n");
            let err = load_from_path(file.path(), Preferences::default()).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidField(_)));
        });
    }

    #[test]
    fn sparked_block_with_trigger_creates_a_spark() {
        with_display(|| {
            let file =
                write_ini("[bar]\nformat = vpn\n\n[vpn]\nmode = sparked\ntrigger = vpn-events\n");
            let state = load_from_path(file.path(), Preferences::default()).unwrap();
            assert_eq!(state.sparks.len(), 1);
            assert_eq!(state.sparks[0].command, "vpn-events");
            assert_eq!(state.blocks[0].spark, Some(lemon_core::SparkId(0)));
        });
    }

    #[test]
    fn missing_config_file_is_reported() {
        with_display(|| {
            let prefs = Preferences {
                config_path: Some(PathBuf::from("/nonexistent/path/does-not-exist.ini")),
                ..Preferences::default()
            };
            let err = load(prefs).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound(_)));
        });
    }
}
