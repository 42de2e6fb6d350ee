//! Markdown-lite: only `#` headings, one line at a time.

const MAX_HEADING_LEVEL: usize = 6;

/// Render submitted post text. Lines starting with 1 to 6 `#` become the
/// heading of that level; everything else passes through untouched.
pub fn convert_to_html(markdown: &str) -> String {
    markdown
        .split('\n')
        .map(parse_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_line(line: &str) -> String {
    let level = line
        .bytes()
        .take(MAX_HEADING_LEVEL)
        .take_while(|b| *b == b'#')
        .count();

    if level == 0 {
        return line.to_string();
    }

    // `#` is one byte, so slicing at `level` stays on a char boundary.
    format!("<h{level}>{}</h{level}>", &line[level..])
}
