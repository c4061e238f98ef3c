//! Builds the renderer's argv from its `Lemon` configuration.

use lemon_core::Lemon;

pub fn build_argv(lemon: &Lemon) -> Vec<String> {
    let mut argv = vec![lemon.bin.clone()];
    let g = lemon.geometry;

    if g.width > 0 || g.height > 0 || g.x != 0 || g.y != 0 {
        argv.push("-g".to_string());
        argv.push(format!("{}x{}+{}+{}", g.width, g.height, g.x, g.y));
    }
    if lemon.bottom {
        argv.push("-b".to_string());
    }
    if lemon.force_docking {
        argv.push("-d".to_string());
    }
    if let Some(fg) = &lemon.colors.fg {
        argv.push("-F".to_string());
        argv.push(fg.clone());
    }
    if let Some(bg) = &lemon.colors.bg {
        argv.push("-B".to_string());
        argv.push(bg.clone());
    }
    if let Some(uc) = &lemon.colors.underline_color {
        argv.push("-U".to_string());
        argv.push(uc.clone());
    }
    if lemon.line_width > 0 {
        argv.push("-u".to_string());
        argv.push(lemon.line_width.to_string());
    }
    for font in lemon
        .fonts
        .block
        .iter()
        .chain(lemon.fonts.label.iter())
        .chain(lemon.fonts.affix.iter())
    {
        argv.push("-f".to_string());
        argv.push(font.clone());
    }
    if let Some(name) = &lemon.window_name {
        argv.push("-n".to_string());
        argv.push(name.clone());
    }
    argv
}
