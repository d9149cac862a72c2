use thiserror::Error;

use crate::diff::{DiffLine, FileChange, Hunk, LineKind, ParsedDiff};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Parse a unified diff string into a `ParsedDiff`.
///
/// Splits on `diff --git` boundaries, extracts paths and file status,
/// then parses hunk headers and classifies individual diff lines. Files
/// whose only change is deletion are skipped entirely. Input that contains
/// no recognizable diff structure at all is an error.
pub fn parse_diff(input: &str) -> Result<ParsedDiff, ParseError> {
    let lines: Vec<&str> = input.lines().collect();

    // Find the start indices of each "diff --git" block
    let mut block_starts: Vec<usize> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git ") {
            block_starts.push(i);
        }
    }

    // Some tools emit bare hunks without the git header line; accept the
    // whole input as a single block if it carries ---/+++ markers.
    if block_starts.is_empty() {
        if lines.iter().any(|l| l.starts_with("--- ")) {
            block_starts.push(0);
        } else {
            return Err(ParseError {
                line: 1,
                message: "input is not a unified diff".to_string(),
            });
        }
    }

    let mut files = Vec::new();
    for (block_idx, &start) in block_starts.iter().enumerate() {
        let end = if block_idx + 1 < block_starts.len() {
            block_starts[block_idx + 1]
        } else {
            lines.len()
        };

        if let Some(file) = parse_file_block(&lines[start..end], start)? {
            files.push(file);
        }
    }

    Ok(ParsedDiff {
        files,
        raw: input.to_string(),
    })
}

/// Parse a single file block (from one `diff --git` line to the next).
/// Returns `None` for deleted files.
fn parse_file_block(block: &[&str], global_offset: usize) -> Result<Option<FileChange>, ParseError> {
    let mut old_path: Option<String> = None;
    let mut new_path: Option<String> = None;
    let mut deleted = false;
    let mut hunks = Vec::new();

    let mut i = 0;

    // Parse header lines until we hit a hunk or end of block
    while i < block.len() {
        let line = block[i];

        if line.starts_with("@@ ") {
            break;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            old_path = if path == "/dev/null" {
                None
            } else {
                Some(strip_ab_prefix(path))
            };
        } else if let Some(path) = line.strip_prefix("+++ ") {
            new_path = if path == "/dev/null" {
                None
            } else {
                Some(strip_ab_prefix(path))
            };
        } else if line.starts_with("deleted file mode") {
            deleted = true;
        } else if let Some(to) = line.strip_prefix("rename to ") {
            new_path = Some(to.to_string());
        }

        i += 1;
    }

    // A deleted file leaves nothing to review
    if deleted || (new_path.is_none() && old_path.is_some() && has_devnull_new_side(block)) {
        return Ok(None);
    }

    // Parse hunks
    while i < block.len() {
        if block[i].starts_with("@@ ") {
            let (hunk, next_i) = parse_hunk(block, i, global_offset)?;
            hunks.push(hunk);
            i = next_i;
        } else {
            i += 1;
        }
    }

    // Binary blocks carry no ---/+++ lines; fall back to the git header
    let path = match new_path.or(old_path).or_else(|| git_header_path(block)) {
        Some(p) => p,
        None => {
            return Err(ParseError {
                line: global_offset + 1,
                message: "file block has no usable path".to_string(),
            });
        }
    };

    let additions = hunks
        .iter()
        .flat_map(|h| &h.lines)
        .filter(|l| l.kind == LineKind::Added)
        .count() as u32;
    let deletions = hunks
        .iter()
        .flat_map(|h| &h.lines)
        .filter(|l| l.kind == LineKind::Removed)
        .count() as u32;

    Ok(Some(FileChange {
        path,
        additions,
        deletions,
        hunks,
    }))
}

/// Detect a deletion block that lacks the `deleted file mode` marker:
/// the new side points at /dev/null.
fn has_devnull_new_side(block: &[&str]) -> bool {
    block.iter().any(|l| *l == "+++ /dev/null")
}

/// Extract the new-side path from a `diff --git a/X b/Y` line.
fn git_header_path(block: &[&str]) -> Option<String> {
    let header = block.first()?.strip_prefix("diff --git ")?;
    let b_side = header.split(' ').next_back()?;
    Some(strip_ab_prefix(b_side))
}

/// Strip the `a/` or `b/` prefix from a diff path.
fn strip_ab_prefix(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("a/").or_else(|| path.strip_prefix("b/")) {
        stripped.to_string()
    } else {
        path.to_string()
    }
}

/// Parse a single hunk starting at the `@@ ...` header line.
/// Returns the parsed `Hunk` and the index of the next line after the hunk.
fn parse_hunk(
    block: &[&str],
    start: usize,
    global_offset: usize,
) -> Result<(Hunk, usize), ParseError> {
    let header = block[start];
    let (old_start, old_count, new_start, new_count) =
        parse_hunk_header(header, global_offset + start)?;

    let mut diff_lines = Vec::new();
    let mut old_line = old_start;
    let mut new_line = new_start;
    let mut i = start + 1;

    while i < block.len() {
        let line = block[i];

        // Stop if we hit the next hunk header
        if line.starts_with("@@ ") {
            break;
        }

        // Skip "\ No newline at end of file"
        if line.starts_with('\\') {
            i += 1;
            continue;
        }

        if line.is_empty() {
            // Empty line in a diff is treated as a context line with empty content
            diff_lines.push(DiffLine {
                kind: LineKind::Context,
                content: String::new(),
                old_line_no: Some(old_line),
                new_line_no: Some(new_line),
            });
            old_line += 1;
            new_line += 1;
        } else {
            // Match on the first byte: slicing at 1 would panic on lines
            // that open with a multi-byte character
            match line.as_bytes()[0] {
                b' ' => {
                    diff_lines.push(DiffLine {
                        kind: LineKind::Context,
                        content: line[1..].to_string(),
                        old_line_no: Some(old_line),
                        new_line_no: Some(new_line),
                    });
                    old_line += 1;
                    new_line += 1;
                }
                b'+' => {
                    diff_lines.push(DiffLine {
                        kind: LineKind::Added,
                        content: line[1..].to_string(),
                        old_line_no: None,
                        new_line_no: Some(new_line),
                    });
                    new_line += 1;
                }
                b'-' => {
                    diff_lines.push(DiffLine {
                        kind: LineKind::Removed,
                        content: line[1..].to_string(),
                        old_line_no: Some(old_line),
                        new_line_no: None,
                    });
                    old_line += 1;
                }
                _ => {
                    // Unknown prefix; stop parsing this hunk
                    break;
                }
            }
        }

        i += 1;
    }

    Ok((
        Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines: diff_lines,
        },
        i,
    ))
}

/// Parse a hunk header like `@@ -10,6 +10,7 @@ fn existing_function() {`
fn parse_hunk_header(header: &str, line_no: usize) -> Result<(u32, u32, u32, u32), ParseError> {
    let after_at = header.strip_prefix("@@ ").ok_or_else(|| ParseError {
        line: line_no + 1,
        message: "expected hunk header starting with '@@'".to_string(),
    })?;

    let closing_pos = after_at.find(" @@").ok_or_else(|| ParseError {
        line: line_no + 1,
        message: "expected closing '@@' in hunk header".to_string(),
    })?;

    let range_part = &after_at[..closing_pos];

    // Parse "-old_start,old_count +new_start,new_count"
    let parts: Vec<&str> = range_part.split(' ').collect();
    if parts.len() != 2 {
        return Err(ParseError {
            line: line_no + 1,
            message: format!("expected two range specs, got {}", parts.len()),
        });
    }

    let (old_start, old_count) = parse_range(parts[0], '-', line_no)?;
    let (new_start, new_count) = parse_range(parts[1], '+', line_no)?;

    Ok((old_start, old_count, new_start, new_count))
}

/// Parse a range spec like `-10,6` or `+10,7` or `-1` (count omitted means 1).
fn parse_range(spec: &str, prefix: char, line_no: usize) -> Result<(u32, u32), ParseError> {
    let stripped = spec.strip_prefix(prefix).ok_or_else(|| ParseError {
        line: line_no + 1,
        message: format!("expected '{}' prefix in range spec '{}'", prefix, spec),
    })?;

    if let Some((start_str, count_str)) = stripped.split_once(',') {
        let start = start_str.parse::<u32>().map_err(|e| ParseError {
            line: line_no + 1,
            message: format!("invalid start in range '{}': {}", spec, e),
        })?;
        let count = count_str.parse::<u32>().map_err(|e| ParseError {
            line: line_no + 1,
            message: format!("invalid count in range '{}': {}", spec, e),
        })?;
        Ok((start, count))
    } else {
        let start = stripped.parse::<u32>().map_err(|e| ParseError {
            line: line_no + 1,
            message: format!("invalid start in range '{}': {}", spec, e),
        })?;
        Ok((start, 1))
    }
}

/// Concatenate the lines of `file_path` whose new-side line number falls
/// within `window` of `line_number`, formatted as `"<line_no>: <text>"`.
///
/// Returns an empty string when the file is not part of the diff. Pure and
/// deterministic: line order is the order they appear in the input.
pub fn get_file_context(
    diff: &ParsedDiff,
    file_path: &str,
    line_number: u32,
    window: u32,
) -> String {
    let Some(file) = diff.files.iter().find(|f| f.path == file_path) else {
        return String::new();
    };

    let mut context = Vec::new();
    for hunk in &file.hunks {
        for line in &hunk.lines {
            if let Some(n) = line.new_line_no {
                if n.abs_diff(line_number) <= window {
                    context.push(format!("{}: {}", n, line.content));
                }
            }
        }
    }
    context.join("\n")
}
