use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LemonError;

/// Opaque handle into the process supervisor's child table.
///
/// Blocks and Sparks hold this by value rather than any process-supervisor
/// type directly, so `lemon-core` never depends on `lemon-process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildId(pub u64);

/// Stable index of a [`Block`] within [`State::blocks`].
///
/// Back-references (e.g. [`Spark::block`]) use this instead of a raw
/// pointer or a `&Block`, so growing the block list never invalidates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// Stable index of a [`Spark`] within [`State::sparks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SparkId(pub usize);

/// Block lifecycle discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Runs exactly once, at startup.
    Once,
    /// Runs on a fixed interval (`reload` seconds).
    Timed,
    /// Runs when its spark produces new output.
    Sparked,
    /// Runs once and is kept alive; every stdout line becomes its output.
    Live,
}

impl FromStr for Mode {
    type Err = LemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(Mode::Once),
            "timed" => Ok(Mode::Timed),
            "sparked" => Ok(Mode::Sparked),
            "live" => Ok(Mode::Live),
            other => Err(LemonError::InvalidMode(other.to_string())),
        }
    }
}

/// Horizontal placement on the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    /// The marker emitted for this alignment in the composed line (`%{l}` etc).
    pub fn marker(self) -> char {
        match self {
            Align::Left => 'l',
            Align::Center => 'c',
            Align::Right => 'r',
        }
    }

    /// Advance to the next alignment, saturating at `Right`. Used when the
    /// format string tokenizer encounters a `|` escalator.
    pub fn escalate(self) -> Align {
        match self {
            Align::Left => Align::Center,
            Align::Center | Align::Right => Align::Right,
        }
    }
}

impl FromStr for Align {
    type Err = LemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Align::Left),
            "center" | "c" => Ok(Align::Center),
            "right" | "r" => Ok(Align::Right),
            other => Err(LemonError::InvalidAlign(other.to_string())),
        }
    }
}

/// The five mouse/scroll actions a block may bind to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionCommands {
    pub lmb: Option<String>,
    pub mmb: Option<String>,
    pub rmb: Option<String>,
    pub scroll_up: Option<String>,
    pub scroll_down: Option<String>,
}

impl ActionCommands {
    /// Iterate bound actions in the fixed `%{A<N>}` slot order (lmb, mmb,
    /// rmb, scroll-up, scroll-down map to N = 1..=5).
    pub fn bound(&self) -> impl Iterator<Item = (u8, &str, &str)> {
        [
            (1u8, "lmb", self.lmb.as_deref()),
            (2, "mmb", self.mmb.as_deref()),
            (3, "rmb", self.rmb.as_deref()),
            (4, "sup", self.scroll_up.as_deref()),
            (5, "sdn", self.scroll_down.as_deref()),
        ]
        .into_iter()
        .filter_map(|(n, suffix, cmd)| cmd.map(|cmd| (n, suffix, cmd)))
    }

    /// Look up the command bound to an action suffix (`lmb`, `sup`, ...).
    pub fn command_for_suffix(&self, suffix: &str) -> Option<&str> {
        match suffix {
            "lmb" => self.lmb.as_deref(),
            "mmb" => self.mmb.as_deref(),
            "rmb" => self.rmb.as_deref(),
            "sup" => self.scroll_up.as_deref(),
            "sdn" => self.scroll_down.as_deref(),
            _ => None,
        }
    }
}

/// Per-block style overrides. `None` means "inherit" (see `lemon-compose` for
/// the resolution chain); `overline`/`underline` are plain bools because
/// their resolution is an OR, not an override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockStyle {
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub label_fg: Option<String>,
    pub label_bg: Option<String>,
    pub label_text: Option<String>,
    pub affix_fg: Option<String>,
    pub affix_bg: Option<String>,
    pub line_color: Option<String>,
    pub overline: bool,
    pub underline: bool,
    pub offset: i32,
    /// Signed min-width: positive pads left (right-aligned body), negative
    /// pads right (left-aligned body). Counted in escaped bytes.
    pub padding: i32,
}

/// One logical cell on the bar.
#[derive(Debug, Clone)]
pub struct Block {
    pub sid: String,
    pub bin: String,
    pub mode: Mode,
    pub reload: f64,
    pub consume: bool,
    pub trigger: Option<String>,
    pub align: Align,
    pub style: BlockStyle,
    pub actions: ActionCommands,
    pub spark: Option<SparkId>,

    // Runtime fields, mutated by the event loop / scheduler.
    pub alive: bool,
    /// Monotonic seconds of the last open, or 0.0 if never opened.
    pub last_open: f64,
    pub last_read: f64,
    /// Last produced stdout line. Never contains an embedded newline.
    pub output: String,
    pub child_id: Option<ChildId>,
}

impl Block {
    pub fn new(sid: impl Into<String>, align: Align) -> Self {
        let sid = sid.into();
        Block {
            bin: sid.clone(),
            sid,
            mode: Mode::Once,
            reload: 1.0,
            consume: false,
            trigger: None,
            align,
            style: BlockStyle::default(),
            actions: ActionCommands::default(),
            spark: None,
            alive: false,
            last_open: 0.0,
            last_read: 0.0,
            output: String::new(),
            child_id: None,
        }
    }
}

/// A long-lived child process whose stdout lines drive a [`Block`].
#[derive(Debug, Clone)]
pub struct Spark {
    pub block: BlockId,
    pub command: String,
    pub alive: bool,
    /// Latest line, consumed (cleared) when the scheduler uses it.
    pub output: Option<String>,
    pub last_open: f64,
    pub last_read: f64,
    pub child_id: Option<ChildId>,
}

impl Spark {
    pub fn new(block: BlockId, command: impl Into<String>) -> Self {
        Spark {
            block,
            command: command.into(),
            alive: false,
            output: None,
            last_open: 0.0,
            last_read: 0.0,
            child_id: None,
        }
    }
}

/// Screen geometry for the renderer window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

/// Bar-level color defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LemonColors {
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub line_color: Option<String>,
    pub underline_color: Option<String>,
}

/// Font slots: block body, label, and prefix/suffix affix text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fonts {
    pub block: Vec<String>,
    pub label: Vec<String>,
    pub affix: Vec<String>,
}

/// Bar-level defaults shared with blocks that don't override them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockDefaults {
    pub fg: Option<String>,
    pub bg: Option<String>,
    pub label_fg: Option<String>,
    pub label_bg: Option<String>,
    pub affix_fg: Option<String>,
    pub affix_bg: Option<String>,
    pub line_color: Option<String>,
    pub overline: bool,
    pub underline: bool,
}

/// The renderer instance: one per process run.
#[derive(Debug, Clone)]
pub struct Lemon {
    pub name: String,
    pub bin: String,
    pub geometry: Geometry,
    pub colors: LemonColors,
    pub line_width: u32,
    pub bottom: bool,
    pub force_docking: bool,
    pub fonts: Fonts,
    pub window_name: Option<String>,
    pub defaults: BlockDefaults,
    pub prefix: String,
    pub suffix: String,
    pub format: String,
}

impl Default for Lemon {
    fn default() -> Self {
        Lemon {
            name: "lemon".to_string(),
            bin: "lemonbar".to_string(),
            geometry: Geometry::default(),
            colors: LemonColors::default(),
            line_width: 0,
            bottom: false,
            force_docking: false,
            fonts: Fonts::default(),
            window_name: None,
            defaults: BlockDefaults::default(),
            prefix: String::new(),
            suffix: String::new(),
            format: String::new(),
        }
    }
}

/// CLI-derived run options. Gates config loading; never read by the
/// scheduler, composer, or dispatcher.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub config_path: Option<std::path::PathBuf>,
    pub bar_section: String,
    pub run_if_empty: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            config_path: None,
            bar_section: "bar".to_string(),
            run_if_empty: false,
        }
    }
}

/// The whole in-memory model consumed by the scheduler, composer, and
/// dispatcher.
#[derive(Debug, Clone)]
pub struct State {
    pub lemon: Lemon,
    pub blocks: Vec<Block>,
    pub sparks: Vec<Spark>,
    pub prefs: Preferences,
    pub dirty: bool,
}

impl State {
    pub fn new(lemon: Lemon, prefs: Preferences) -> Self {
        State {
            lemon,
            blocks: Vec::new(),
            sparks: Vec::new(),
            prefs,
            dirty: false,
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn spark(&self, id: SparkId) -> &Spark {
        &self.sparks[id.0]
    }

    pub fn spark_mut(&mut self, id: SparkId) -> &mut Spark {
        &mut self.sparks[id.0]
    }

    /// Find a block's index by sid, used when wiring config sections and
    /// when the action dispatcher routes an incoming click.
    pub fn find_block(&self, sid: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.sid == sid)
            .map(BlockId)
    }

    /// Push a new block, returning its stable id.
    pub fn push_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        BlockId(self.blocks.len() - 1)
    }

    /// Push a new spark, returning its stable id.
    pub fn push_spark(&mut self, spark: Spark) -> SparkId {
        self.sparks.push(spark);
        SparkId(self.sparks.len() - 1)
    }
}
