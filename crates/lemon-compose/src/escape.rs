//! Escaping and width-aware padding (§4.E step 5, §9 "escape math").
//!
//! The padding width is computed on the *escaped* string, so visual
//! min-width stays correct even though escaping can grow the byte count.

/// Double every literal `%` so lemonbar's markup parser doesn't interpret
/// block output as formatting directives.
pub fn escape_percent(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    s.replace('%', "%%")
}

/// Pad an already-escaped string to `|padding|` characters.
///
/// Positive `padding` right-aligns (pads on the left); negative
/// left-aligns (pads on the right). Strings already at or past the target
/// width are returned unchanged.
pub fn pad_escaped(escaped: &str, padding: i32) -> String {
    let width = padding.unsigned_abs() as usize;
    let len = escaped.chars().count();
    if len >= width {
        return escaped.to_string();
    }
    let fill = " ".repeat(width - len);
    if padding >= 0 {
        format!("{fill}{escaped}")
    } else {
        format!("{escaped}{fill}")
    }
}
