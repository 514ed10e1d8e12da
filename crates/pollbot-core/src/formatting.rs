/// Escape text for Telegram's `HTML` parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render `(command, description)` pairs as an HTML help listing.
pub fn command_list_html<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    entries
        .into_iter()
        .map(|(cmd, desc)| format!("/{} - {}", escape_html(cmd), escape_html(desc)))
        .collect::<Vec<_>>()
        .join("\n")
}
