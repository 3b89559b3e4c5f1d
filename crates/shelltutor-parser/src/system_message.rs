/// Renders a queued system message as cyan text prefixed with a
/// triangle glyph, with a leading `\r` + erase-to-end-of-line so it
/// overwrites any partial prompt sitting on the current terminal row.
///
/// Grounded in `omnish-client::display::render_error`'s
/// `"\r\n" + color + bracketed-label + reset` shape.
pub fn render_system_message(text: &str) -> String {
    format!("\r\x1b[K\x1b[36m\u{25b2} {text}\x1b[0m\r\n")
}
