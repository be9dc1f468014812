//! Line-oriented, single-pass parser for Taskell Markdown.

use chrono::NaiveDate;

use crate::{BoardDoc, ColumnDoc, ParseError, TaskDoc, unescape_text};

/// Parses a Taskell Markdown document.
///
/// The parser never fails outright: malformed constructs are reported as
/// [`ParseError`]s with their 1-based line numbers and skipped, so a
/// hand-edited board with one bad date still imports.
pub fn parse(input: &str) -> (BoardDoc, Vec<ParseError>) {
    let mut doc = BoardDoc::default();
    let mut errors = Vec::new();
    let mut have_name = false;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;

        if raw.trim().is_empty() {
            continue;
        }

        // Indented sublines belong to the most recent task.
        if let Some(sub) = raw.strip_prefix("    ") {
            let Some(task) = doc
                .columns
                .last_mut()
                .and_then(|c| c.tasks.last_mut())
            else {
                errors.push(ParseError {
                    line: line_no,
                    message: "indented line outside any task".into(),
                });
                continue;
            };
            parse_subline(sub, line_no, task, &mut errors);
            continue;
        }

        if let Some(name) = raw.strip_prefix("## ") {
            doc.columns.push(ColumnDoc {
                name: unescape_text(name.trim_end()),
                wip_limit: None,
                terminal: false,
                tasks: Vec::new(),
            });
            continue;
        }

        if let Some(name) = raw.strip_prefix("# ") {
            if have_name {
                errors.push(ParseError {
                    line: line_no,
                    message: "duplicate board header ignored".into(),
                });
            } else {
                doc.name = unescape_text(name.trim_end());
                have_name = true;
            }
            continue;
        }

        if raw.starts_with("<!--") {
            parse_column_metadata(raw, line_no, &mut doc, &mut errors);
            continue;
        }

        if let Some(rest) = raw.strip_prefix("- ") {
            let Some(column) = doc.columns.last_mut() else {
                errors.push(ParseError {
                    line: line_no,
                    message: "task before any column".into(),
                });
                continue;
            };
            column.tasks.push(parse_task_line(rest));
            continue;
        }

        errors.push(ParseError {
            line: line_no,
            message: format!("unrecognized line: {raw:?}"),
        });
    }

    (doc, errors)
}

/// Parses the remainder of a `- ` line into a task, extracting an
/// unescaped `<!-- id:... -->` trailer when present.
fn parse_task_line(rest: &str) -> TaskDoc {
    let mut task = TaskDoc::default();
    let mut title_part = rest;

    if let Some(open) = rest.rfind("<!-- id:") {
        let escaped = open > 0 && rest.as_bytes()[open - 1] == b'\\';
        let tail = &rest[open + "<!-- id:".len()..];
        if !escaped && tail.trim_end().ends_with("-->") {
            let id = tail.trim_end().trim_end_matches("-->").trim();
            if !id.is_empty() {
                task.id = Some(id.to_string());
                title_part = rest[..open].trim_end();
            }
        }
    }

    task.title = unescape_text(title_part);
    task
}

/// Parses one 4-space-indented subline. Unknown shapes are ignored.
fn parse_subline(sub: &str, line_no: usize, task: &mut TaskDoc, errors: &mut Vec<ParseError>) {
    if let Some(desc) = sub.strip_prefix("> ") {
        push_description_line(task, &unescape_text(desc));
        return;
    }
    if sub == ">" {
        push_description_line(task, "");
        return;
    }

    if let Some(assignee) = sub.strip_prefix("@ assigned: ") {
        task.assigned_to = Some(assignee.trim().to_string());
        return;
    }

    if let Some(rest) = sub.strip_prefix("@ ") {
        let mut date_part = rest.trim_end();
        if date_part == "✓" {
            task.completed = true;
            return;
        }
        if let Some(stripped) = date_part.strip_suffix(" ✓") {
            task.completed = true;
            date_part = stripped.trim_end();
        }
        match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            Ok(date) => task.due_date = Some(date),
            Err(_) => errors.push(ParseError {
                line: line_no,
                message: format!("invalid date: {date_part:?} (expected YYYY-MM-DD)"),
            }),
        }
        return;
    }

    if let Some(labels) = sub.strip_prefix("# ") {
        task.labels = labels
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        return;
    }

    // Unknown indented lines are ignored but not fatal.
}

fn push_description_line(task: &mut TaskDoc, line: &str) {
    if task.description.is_empty() {
        task.description = line.to_string();
    } else {
        task.description.push('\n');
        task.description.push_str(line);
    }
}

/// Parses an unindented `<!-- ... -->` as metadata of the current column.
fn parse_column_metadata(
    raw: &str,
    line_no: usize,
    doc: &mut BoardDoc,
    errors: &mut Vec<ParseError>,
) {
    let Some(column) = doc.columns.last_mut() else {
        // A comment before any column carries no meaning; skip quietly.
        return;
    };
    let inner = raw
        .trim_start_matches("<!--")
        .trim_end_matches("-->")
        .trim();

    if let Some(value) = inner.strip_prefix("WIP Limit:") {
        match value.trim().parse::<u32>() {
            Ok(limit) => column.wip_limit = Some(limit),
            Err(_) => errors.push(ParseError {
                line: line_no,
                message: format!("invalid WIP limit: {:?}", value.trim()),
            }),
        }
        return;
    }
    if inner == "Terminal column" {
        column.terminal = true;
    }
    // Other comments are ignored.
}
