//! Action Dispatcher (§4.F): parses renderer feedback lines and invokes
//! the matching block's action command, fire-and-forget.

use lemon_core::State;
use tokio::process::Command;

const KNOWN_SUFFIXES: [&str; 5] = ["lmb", "mmb", "rmb", "sup", "sdn"];

/// Result of handling one line from the renderer's stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `sid`'s action for `suffix` was found and spawned.
    Dispatched { sid: String, suffix: String },
    /// Parsed fine, but no block with this sid has that action bound.
    NoCommandBound { sid: String, suffix: String },
    /// Too short, or no underscore, or suffix not in the closed set.
    Malformed,
}

/// Split `<sid>_<suffix>` at the final underscore and validate `suffix`
/// against the closed set (§9(c): unambiguous, not a fixed byte count).
pub fn parse_action_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.len() < 5 {
        return None;
    }
    let idx = trimmed.rfind('_')?;
    let (sid, suffix) = (&trimmed[..idx], &trimmed[idx + 1..]);
    if sid.is_empty() || !KNOWN_SUFFIXES.contains(&suffix) {
        return None;
    }
    Some((sid, suffix))
}

/// Parse a renderer feedback line, look up the bound command, and spawn it
/// detached (stdio discarded, not awaited). Returns the outcome so the
/// caller can decide what to log; this function never blocks the event
/// loop on the spawned command.
pub fn dispatch_line(state: &State, line: &str) -> Outcome {
    let Some((sid, suffix)) = parse_action_line(line) else {
        return Outcome::Malformed;
    };

    let Some(block_id) = state.find_block(sid) else {
        return Outcome::NoCommandBound {
            sid: sid.to_string(),
            suffix: suffix.to_string(),
        };
    };

    let block = state.block(block_id);
    let Some(command) = block.actions.command_for_suffix(suffix) else {
        return Outcome::NoCommandBound {
            sid: sid.to_string(),
            suffix: suffix.to_string(),
        };
    };

    spawn_detached(command);
    Outcome::Dispatched {
        sid: sid.to_string(),
        suffix: suffix.to_string(),
    }
}

/// Run `command` via `sh -c`, discard its output, and don't await
/// completion on the caller's behalf — a background task reaps it so it
/// never becomes a zombie.
fn spawn_detached(command: &str) {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(false);

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    match cmd.spawn() {
        Ok(mut child) => {
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
        Err(e) => {
            tracing::warn!(command, error = %e, "failed to spawn action command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemon_core::{Align, Block};

    #[test]
    fn parses_valid_action_line() {
        assert_eq!(parse_action_line("datetime_lmb"), Some(("datetime", "lmb")));
        assert_eq!(parse_action_line("datetime_lmb\n"), Some(("datetime", "lmb")));
    }

    #[test]
    fn rejects_lines_shorter_than_five() {
        assert_eq!(parse_action_line("a_b"), None);
    }

    #[test]
    fn rejects_unknown_suffix() {
        assert_eq!(parse_action_line("datetime_xyz"), None);
    }

    #[test]
    fn splits_at_final_underscore_for_sids_with_underscores() {
        assert_eq!(
            parse_action_line("battery_status_rmb"),
            Some(("battery_status", "rmb"))
        );
    }

    #[test]
    fn dispatch_reports_no_command_bound_for_unmatched_sid() {
        let state = lemon_core::State::new(lemon_core::Lemon::default(), lemon_core::Preferences::default());
        let outcome = dispatch_line(&state, "nope_lmb");
        assert_eq!(
            outcome,
            Outcome::NoCommandBound { sid: "nope".into(), suffix: "lmb".into() }
        );
    }

    #[test]
    fn dispatch_reports_malformed_for_bad_lines() {
        let state = lemon_core::State::new(lemon_core::Lemon::default(), lemon_core::Preferences::default());
        assert_eq!(dispatch_line(&state, "ab"), Outcome::Malformed);
    }

    #[tokio::test]
    async fn dispatch_runs_bound_command() {
        let mut state = lemon_core::State::new(lemon_core::Lemon::default(), lemon_core::Preferences::default());
        let mut block = Block::new("vol", Align::Left);
        block.actions.lmb = Some("true".to_string());
        state.push_block(block);

        let outcome = dispatch_line(&state, "vol_lmb");
        assert_eq!(
            outcome,
            Outcome::Dispatched { sid: "vol".into(), suffix: "lmb".into() }
        );
        // Give the detached reaper task a chance to run; nothing to
        // assert beyond "this doesn't panic or hang".
        tokio::task::yield_now().await;
    }
}
