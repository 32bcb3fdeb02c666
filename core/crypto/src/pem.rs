//! PEM text normalization.

/// Column width of PEM body lines.
pub const PEM_LINE_WIDTH: usize = 64;

/// Reformat arbitrary text into strict PEM line structure.
///
/// Literal `\n` and `\r` escape sequences become real line breaks. Every
/// `-----BEGIN ...-----` and `-----END ...-----` armor line is put on a line
/// of its own, and everything else has its whitespace removed and is
/// re-wrapped at [`PEM_LINE_WIDTH`] columns. The output always ends with a
/// newline.
///
/// # Postconditions
/// - No body line is longer than 64 characters
/// - The result ends with `'\n'`
pub fn normalize_pem(source: &str) -> String {
    let text = source
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "\n");

    let mut out = String::with_capacity(text.len() + text.len() / PEM_LINE_WIDTH + 2);
    let mut rest = text.as_str();
    while let Some((start, end)) = next_armor(rest) {
        push_wrapped(&mut out, &rest[..start]);
        out.push_str(rest[start..end].trim());
        out.push('\n');
        rest = &rest[end..];
    }
    push_wrapped(&mut out, rest);

    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Byte range of the next armor line, `-----` to `-----` inclusive.
fn next_armor(text: &str) -> Option<(usize, usize)> {
    let start = [text.find("-----BEGIN"), text.find("-----END")]
        .into_iter()
        .flatten()
        .min()?;
    let label = start + "-----".len();
    let close = text[label..].find("-----")? + label;
    Some((start, close + "-----".len()))
}

fn push_wrapped(out: &mut String, body: &str) {
    let mut column = 0;
    for c in body.chars().filter(|c| !c.is_whitespace()) {
        out.push(c);
        column += 1;
        if column == PEM_LINE_WIDTH {
            out.push('\n');
            column = 0;
        }
    }
    if column > 0 {
        out.push('\n');
    }
}
