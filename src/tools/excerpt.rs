/// Lines kept from the top of a long file.
pub const HEAD_LINES: usize = 20;
/// Lines kept from the bottom of a long file.
pub const TAIL_LINES: usize = 15;
/// Files up to this many lines are shown whole.
pub const FULL_FILE_MAX_LINES: usize = 40;

/// Whole file when short, otherwise head and tail around an ellipsis line.
pub fn head_tail_excerpt(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= FULL_FILE_MAX_LINES {
        return lines.join("\n");
    }

    let omitted = lines.len() - HEAD_LINES - TAIL_LINES;
    let mut excerpt = lines[..HEAD_LINES].join("\n");
    excerpt.push_str(&format!("\n... ({} lines omitted) ...\n", omitted));
    excerpt.push_str(&lines[lines.len() - TAIL_LINES..].join("\n"));
    excerpt
}

pub fn head_excerpt(content: &str, max_lines: usize) -> String {
    content
        .lines()
        .take(max_lines)
        .collect::<Vec<_>>()
        .join("\n")
}
