//! Output Composer (§4.E): produces the renderer's input line with
//! layered style inheritance and safe escaping.

pub mod escape;
pub mod segment;
pub mod style;

use lemon_core::State;

pub use escape::{escape_percent, pad_escaped};
pub use segment::render_block;
pub use style::{resolve, ResolvedStyle};

/// Compose the full line to send to the renderer: one segment per block,
/// an alignment marker inserted whenever alignment changes from the
/// previous block, terminated by exactly one newline.
///
/// Composing the same `State` twice is byte-for-byte identical; this
/// function has no side effects and does not touch `state.dirty` — the
/// event loop clears that flag itself once the line has been written.
pub fn compose(state: &State) -> String {
    let mut out = String::new();
    let mut current_align = None;

    for block in &state.blocks {
        if current_align != Some(block.align) {
            out.push_str("%{");
            out.push(block.align.marker());
            out.push('}');
            current_align = Some(block.align);
        }
        out.push_str(&render_block(block, &state.lemon));
    }

    out.push('\n');
    out
}
