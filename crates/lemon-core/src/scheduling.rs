//! Pure, framework-agnostic scheduling decisions.
//!
//! Kept free of any async runtime so the due-now rules (§4.C of the design)
//! can be unit tested against plain `f64` timestamps instead of a real
//! clock. `lemon-loop` is the thin tokio-aware shell that calls into this.

use crate::types::{Block, Mode};

/// Seconds of early-fire slack for TIMED blocks, so the loop never sleeps
/// for an arbitrarily small remainder.
pub const WAIT_TOLERANCE: f64 = 0.1;

/// Whether `block` is due to be (re-)opened at `now` (monotonic seconds).
///
/// `spark_output_pending` is only consulted for SPARKED blocks; pass
/// `false` for every other mode.
pub fn is_due(block: &Block, spark_output_pending: bool, now: f64) -> bool {
    if block.alive {
        // TIMED blocks must finish their current run before reopening;
        // the other modes simply have no "due" transition while alive.
        return false;
    }
    match block.mode {
        Mode::Once => block.last_open == 0.0,
        Mode::Timed => {
            block.last_open == 0.0
                || block.reload - (now - block.last_open) < WAIT_TOLERANCE
        }
        Mode::Sparked => {
            spark_output_pending || (!block.consume && block.last_open == 0.0)
        }
        Mode::Live => block.last_open == 0.0,
    }
}

/// Seconds until a TIMED block next becomes due, or `None` if it isn't
/// TIMED, has never run, or is currently alive (no next-due prediction).
pub fn seconds_until_due(block: &Block, now: f64) -> Option<f64> {
    if block.mode != Mode::Timed || block.alive || block.last_open == 0.0 {
        return None;
    }
    let remaining = block.reload - (now - block.last_open);
    Some((remaining - WAIT_TOLERANCE).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Align;

    fn timed(reload: f64, last_open: f64, alive: bool) -> Block {
        let mut b = Block::new("t", Align::Left);
        b.mode = Mode::Timed;
        b.reload = reload;
        b.last_open = last_open;
        b.alive = alive;
        b
    }

    #[test]
    fn once_is_due_only_before_first_open() {
        let mut b = Block::new("once", Align::Left);
        assert!(is_due(&b, false, 10.0));
        b.last_open = 5.0;
        assert!(!is_due(&b, false, 10.0));
    }

    #[test]
    fn timed_rhythm_fires_at_reload_boundary() {
        // Scenario 1: reload = 0.5, opened at t=0.
        let b = timed(0.5, 0.0, false);
        assert!(!is_due(&b, false, 0.3));
        assert!(is_due(&b, false, 0.41)); // within WAIT_TOLERANCE of 0.5
        assert!(is_due(&b, false, 0.5));
    }

    #[test]
    fn timed_alive_block_is_never_due() {
        let b = timed(0.5, 0.0, true);
        assert!(!is_due(&b, false, 10.0));
    }

    #[test]
    fn sparked_due_only_on_pending_output_when_consuming() {
        let mut b = Block::new("s", Align::Left);
        b.mode = Mode::Sparked;
        b.consume = true;
        assert!(!is_due(&b, false, 1.0));
        assert!(is_due(&b, true, 1.0));
    }

    #[test]
    fn sparked_non_consuming_fires_once_up_front() {
        let mut b = Block::new("s", Align::Left);
        b.mode = Mode::Sparked;
        b.consume = false;
        assert!(is_due(&b, false, 1.0));
        b.last_open = 1.0;
        assert!(!is_due(&b, false, 2.0));
        assert!(is_due(&b, true, 2.0));
    }

    #[test]
    fn live_is_due_only_before_first_open() {
        let mut b = Block::new("l", Align::Left);
        b.mode = Mode::Live;
        assert!(is_due(&b, false, 0.0));
        b.last_open = 1.0;
        assert!(!is_due(&b, false, 100.0));
    }

    #[test]
    fn seconds_until_due_accounts_for_tolerance() {
        let b = timed(1.0, 0.0, false);
        let remaining = seconds_until_due(&b, 0.2).unwrap();
        assert!((remaining - 0.7).abs() < 1e-9);
    }
}
