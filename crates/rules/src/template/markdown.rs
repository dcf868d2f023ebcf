//! Markdown transforms for Asana note and comment fields.

use regex::Regex;

/// Strip markdown down to plain text safe for a task's notes field.
///
/// Removes images, HTML comments, and whole `<details>` blocks,
/// converts `<br>` to newlines, normalizes line endings, and collapses
/// runs of blank lines.
pub fn sanitize(input: &str) -> String {
    let mut text = normalize_newlines(input);

    text = replace_all(&text, r"\[!\[[^\]]*\]\([^)]*\)\]\([^)]*\)", "");
    text = replace_all(&text, r"!\[[^\]]*\]\([^)]*\)", "");
    text = replace_all(&text, r"(?s)<!--.*?-->", "");
    text = replace_all(&text, r"(?is)<details[^>]*>.*?</details>", "");
    text = replace_all(&text, r"(?i)<br\s*/?>", "\n");

    let text = text
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let text = replace_all(&text, r"\n{3,}", "\n\n");
    text.trim().to_string()
}

/// Convert a GitHub-flavored markdown subset to Asana-compatible HTML.
///
/// Headings H3+ downgrade to `<h2>` (Asana has no deeper levels),
/// images and comments are dropped, `<details>` blocks are unwrapped to
/// their content, and any other raw HTML tag is stripped.
pub fn to_html(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }

    let mut text = normalize_newlines(input);
    text = replace_all(&text, r"\[!\[[^\]]*\]\([^)]*\)\]\([^)]*\)", "");
    text = replace_all(&text, r"!\[[^\]]*\]\([^)]*\)", "");
    text = replace_all(&text, r"(?s)<!--.*?-->", "");
    text = replace_all(&text, r"(?i)</?details[^>]*>", "");
    text = replace_all(&text, r"(?i)</?summary[^>]*>", "");

    let mut out: Vec<String> = Vec::new();
    let mut in_code = false;
    let mut list: Option<&'static str> = None;
    let mut in_table = false;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            close_list(&mut list, &mut out);
            close_table(&mut in_table, &mut out);
            out.push(if in_code { "</code>" } else { "<code>" }.to_string());
            in_code = !in_code;
            continue;
        }
        if in_code {
            out.push(line.to_string());
            continue;
        }

        if let Some(row) = table_row(line) {
            close_list(&mut list, &mut out);
            if !row.is_empty() {
                if !in_table {
                    out.push("<table>".to_string());
                    in_table = true;
                }
                out.push(row);
            }
            continue;
        }
        close_table(&mut in_table, &mut out);

        if let Some((tag, item)) = list_item(line) {
            match list {
                Some(open) if open == tag => {}
                Some(open) => {
                    out.push(format!("</{}>", open));
                    out.push(format!("<{}>", tag));
                    list = Some(tag);
                }
                None => {
                    out.push(format!("<{}>", tag));
                    list = Some(tag);
                }
            }
            out.push(format!("<li>{}</li>", inline(&item)));
            continue;
        }
        close_list(&mut list, &mut out);

        if let Some(heading) = heading(line) {
            out.push(heading);
            continue;
        }

        if line.trim().is_empty() {
            out.push(String::new());
            continue;
        }

        out.push(inline(line));
    }

    if in_code {
        out.push("</code>".to_string());
    }
    close_list(&mut list, &mut out);
    close_table(&mut in_table, &mut out);

    let html = out.join("\n");
    let html = replace_all(&html, r"\n{3,}", "\n\n");
    html.trim().to_string()
}

fn normalize_newlines(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn close_list(list: &mut Option<&'static str>, out: &mut Vec<String>) {
    if let Some(tag) = list.take() {
        out.push(format!("</{}>", tag));
    }
}

fn close_table(in_table: &mut bool, out: &mut Vec<String>) {
    if *in_table {
        out.push("</table>".to_string());
        *in_table = false;
    }
}

/// Inline markdown spans to HTML within one line. Raw HTML tags are
/// stripped before the markdown conversion runs.
fn inline(line: &str) -> String {
    let mut s = replace_all(line, r"(?i)<br\s*/?>", "\n");
    s = replace_all(&s, r"</?[a-zA-Z][^>]*>", "");
    s = replace_all(&s, r"`([^`]+)`", "<code>$1</code>");
    s = replace_all(&s, r"\*\*([^*]+)\*\*", "<strong>$1</strong>");
    s = replace_all(&s, r"__([^_]+)__", "<strong>$1</strong>");
    s = replace_all(&s, r"~~([^~]+)~~", "<s>$1</s>");
    s = replace_all(&s, r"\*([^*]+)\*", "<em>$1</em>");
    s = replace_all(&s, r"(^|\s)_([^_]+)_($|\s)", "$1<em>$2</em>$3");
    s = replace_all(&s, r"\[([^\]]+)\]\(([^)]+)\)", r#"<a href="$2">$1</a>"#);
    s
}

fn heading(line: &str) -> Option<String> {
    let re = Regex::new(r"^(#{1,6})\s+(.*)$").ok()?;
    let caps = re.captures(line.trim())?;
    let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
    let text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let tag = if level <= 2 {
        format!("h{}", level)
    } else {
        "h2".to_string()
    };
    Some(format!("<{}>{}</{}>", tag, inline(text), tag))
}

fn list_item(line: &str) -> Option<(&'static str, String)> {
    let unordered = Regex::new(r"^\s*[-*+]\s+(.*)$").ok()?;
    if let Some(caps) = unordered.captures(line) {
        let text = caps.get(1).map(|m| m.as_str().to_string())?;
        return Some(("ul", text));
    }

    let ordered = Regex::new(r"^\s*\d+[.)]\s+(.*)$").ok()?;
    if let Some(caps) = ordered.captures(line) {
        let text = caps.get(1).map(|m| m.as_str().to_string())?;
        return Some(("ol", text));
    }

    None
}

/// A table line becomes a `<tr>` of `<td>` cells; the separator row
/// yields an empty marker the caller drops.
fn table_row(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return None;
    }

    let separator = Regex::new(r"^\|?[\s\-:|]+\|?$").ok()?;
    if separator.is_match(trimmed) {
        return Some(String::new());
    }

    let cells: Vec<String> = trimmed
        .trim_matches('|')
        .split('|')
        .map(|cell| format!("<td>{}</td>", inline(cell.trim())))
        .collect();
    Some(format!("<tr>{}</tr>", cells.join("")))
}

fn replace_all(text: &str, pattern: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(text, replacement).to_string(),
        Err(e) => {
            tracing::error!(pattern, error = %e, "Invalid markdown pattern");
            text.to_string()
        }
    }
}
