//! Deterministic serialisation of a [`BoardDoc`] to Taskell Markdown.

use std::fmt::Write;

use crate::{BoardDoc, TaskDoc, escape_text};

/// Options controlling serialisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    /// Emit `<!-- id:... -->` trailers so a re-import can match tasks to
    /// their original global ids.
    pub include_metadata: bool,
}

/// Serialises a board document.
///
/// Tasks are emitted in document order; the storage layer sorts them by
/// position (then id) before building the document, so output is stable for
/// a given board state.
pub fn serialize(doc: &BoardDoc, opts: SerializeOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", escape_text(&doc.name));

    for column in &doc.columns {
        out.push('\n');
        let _ = writeln!(out, "## {}", escape_text(&column.name));
        if let Some(limit) = column.wip_limit {
            let _ = writeln!(out, "<!-- WIP Limit: {limit} -->");
        }
        if column.terminal {
            let _ = writeln!(out, "<!-- Terminal column -->");
        }
        if !column.tasks.is_empty() {
            out.push('\n');
            for task in &column.tasks {
                write_task(&mut out, task, opts);
            }
        }
    }

    out
}

fn write_task(out: &mut String, task: &TaskDoc, opts: SerializeOptions) {
    let title = escape_text(&task.title);
    match (&task.id, opts.include_metadata) {
        (Some(id), true) => {
            let _ = writeln!(out, "- {title} <!-- id:{id} -->");
        }
        _ => {
            let _ = writeln!(out, "- {title}");
        }
    }

    // Date line: `@ <date>[ ✓]`. A completed task with no due date still
    // carries a bare `@ ✓` so completion survives the round trip.
    match (task.due_date, task.completed) {
        (Some(date), true) => {
            let _ = writeln!(out, "    @ {} ✓", date.format("%Y-%m-%d"));
        }
        (Some(date), false) => {
            let _ = writeln!(out, "    @ {}", date.format("%Y-%m-%d"));
        }
        (None, true) => {
            let _ = writeln!(out, "    @ ✓");
        }
        (None, false) => {}
    }

    if !task.labels.is_empty() {
        let _ = writeln!(out, "    # {}", task.labels.join(", "));
    }

    if let Some(ref assignee) = task.assigned_to {
        let _ = writeln!(out, "    @ assigned: {assignee}");
    }

    if !task.description.is_empty() {
        for line in task.description.split('\n') {
            let _ = writeln!(out, "    > {}", escape_text(line));
        }
    }
}
