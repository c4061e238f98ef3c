//! Per-block segment rendering (§4.E steps 1-8).

use std::fmt::Write as _;

use lemon_core::{Block, Lemon};

use crate::escape::{escape_percent, pad_escaped};
use crate::style::resolve;

/// Render one block's full markup segment: action openers, style prelude,
/// prefix/label/body/suffix chunks, style reset, action closers.
pub fn render_block(block: &Block, lemon: &Lemon) -> String {
    let style = resolve(block, lemon);
    let mut out = String::new();

    let bound: Vec<_> = block.actions.bound().collect();
    for (n, suffix, _) in &bound {
        let _ = write!(out, "%{{A{n}:{}_{suffix}:}}", block.sid);
    }

    let over = if style.overline { '+' } else { '-' };
    let under = if style.underline { '+' } else { '-' };
    let _ = write!(
        out,
        "%{{O{}}}%{{F{}}}%{{B{}}}%{{U{}}}%{{{over}o{under}u}}",
        style.offset, style.fg, style.bg, style.line_color,
    );

    let _ = write!(
        out,
        "%{{T3}}%{{F{}}}%{{B{}}}{}",
        style.affix_fg, style.affix_bg, lemon.prefix
    );

    let _ = write!(
        out,
        "%{{T2}}%{{F{}}}%{{B{}}}{}",
        style.label_fg, style.label_bg, style.label_text
    );

    let escaped_body = escape_percent(&block.output);
    let padded_body = pad_escaped(&escaped_body, style.padding);
    let _ = write!(
        out,
        "%{{T1}}%{{F{}}}%{{B{}}}{}",
        style.fg, style.bg, padded_body
    );

    let _ = write!(
        out,
        "%{{T3}}%{{F{}}}%{{B{}}}{}",
        style.affix_fg, style.affix_bg, lemon.suffix
    );

    out.push_str("%{T-}%{F-}%{B-}%{U-}%{-o-u}");

    for _ in &bound {
        out.push_str("%{A}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemon_core::Align;

    #[test]
    fn body_escape_count_matches_invariant() {
        let mut block = Block::new("cpu", Align::Left);
        block.output = "50%".to_string();
        let lemon = Lemon::default();
        let rendered = render_block(&block, &lemon);

        // The body chunk is the only place the raw output appears; the
        // number of literal `%` in `block.output` must equal half the
        // number of `%` contributed by escaping it in the rendered chunk.
        let raw_percent_count = block.output.matches('%').count();
        let body_escaped = super::escape_percent(&block.output);
        assert_eq!(body_escaped.matches('%').count(), raw_percent_count * 2);
        assert!(rendered.contains(&body_escaped));
    }

    #[test]
    fn action_openers_and_closers_are_balanced() {
        let mut block = Block::new("vol", Align::Left);
        block.actions.lmb = Some("amixer set Master toggle".to_string());
        block.actions.scroll_up = Some("amixer set Master 5%+".to_string());
        let lemon = Lemon::default();
        let rendered = render_block(&block, &lemon);

        assert!(rendered.contains("%{A1:vol_lmb:}"));
        assert!(rendered.contains("%{A4:vol_sup:}"));
        assert_eq!(rendered.matches("%{A}").count(), 2);
    }

    #[test]
    fn no_actions_means_no_openers_or_closers() {
        let block = Block::new("sep", Align::Left);
        let lemon = Lemon::default();
        let rendered = render_block(&block, &lemon);
        assert!(!rendered.contains("%{A"));
    }
}
