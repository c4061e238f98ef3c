//! Style inheritance resolution (§4.E): block-level override wins, else
//! the bar-level default, else a local fallback.

use lemon_core::{Block, Lemon};

/// Fully resolved per-block style, with every color defaulted to `-`
/// (lemonbar's "reset to default" marker) rather than left unset.
#[derive(Debug, Clone)]
pub struct ResolvedStyle {
    pub fg: String,
    pub bg: String,
    pub label_fg: String,
    pub label_bg: String,
    pub label_text: String,
    pub affix_fg: String,
    pub affix_bg: String,
    pub line_color: String,
    pub overline: bool,
    pub underline: bool,
    pub offset: i32,
    pub padding: i32,
}

fn dash(v: Option<String>) -> String {
    v.unwrap_or_else(|| "-".to_string())
}

/// Resolve a block's effective style against the bar's defaults.
///
/// Overline/underline are a logical OR of block and bar flags (a
/// deliberately preserved quirk: a bar-level `underline=false` can never
/// turn off a block-level `underline=true`).
pub fn resolve(block: &Block, lemon: &Lemon) -> ResolvedStyle {
    let fg = block.style.fg.clone().or_else(|| lemon.defaults.fg.clone());
    let bg = block.style.bg.clone().or_else(|| lemon.defaults.bg.clone());

    let label_fg = block
        .style
        .label_fg
        .clone()
        .or_else(|| lemon.defaults.label_fg.clone())
        .or_else(|| fg.clone());
    let label_bg = block
        .style
        .label_bg
        .clone()
        .or_else(|| lemon.defaults.label_bg.clone())
        .or_else(|| bg.clone());

    let affix_fg = block
        .style
        .affix_fg
        .clone()
        .or_else(|| lemon.defaults.affix_fg.clone())
        .or_else(|| fg.clone());
    let affix_bg = block
        .style
        .affix_bg
        .clone()
        .or_else(|| lemon.defaults.affix_bg.clone())
        .or_else(|| bg.clone());

    let line_color = block
        .style
        .line_color
        .clone()
        .or_else(|| lemon.defaults.line_color.clone());

    ResolvedStyle {
        fg: dash(fg),
        bg: dash(bg),
        label_fg: dash(label_fg),
        label_bg: dash(label_bg),
        label_text: block.style.label_text.clone().unwrap_or_default(),
        affix_fg: dash(affix_fg),
        affix_bg: dash(affix_bg),
        line_color: dash(line_color),
        overline: block.style.overline || lemon.defaults.overline,
        underline: block.style.underline || lemon.defaults.underline,
        offset: block.style.offset,
        padding: block.style.padding,
    }
}
