//! Format trees and run summaries as text.

use crate::cleanup::{CleanupReport, SelectionRequest};
use crate::render::RenderReport;
use crate::sync::{DownloadReport, PushOutcome};
use crate::tree::{BuildReport, DocumentTree, Node, NodeHandle};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Terminal width: `COLUMNS` if set, else the size of the terminal on
/// stdout, else 80.
pub fn terminal_width() -> usize {
    let detected = console::Term::stdout()
        .size_checked()
        .map(|(_rows, columns)| usize::from(columns));
    resolve_width(std::env::var("COLUMNS").ok().as_deref(), detected)
}

fn resolve_width(columns: Option<&str>, detected: Option<usize>) -> usize {
    columns
        .and_then(|c| c.trim().parse().ok())
        .or(detected)
        .filter(|&c: &usize| c >= 20)
        .unwrap_or(80)
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// What a push will do with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushNote {
    Upload,
    ExistsAlready,
    GetsModified,
}

impl PushNote {
    pub fn of(node: &Node) -> Self {
        if node.pending_modification {
            PushNote::GetsModified
        } else if node.exists_remotely {
            PushNote::ExistsAlready
        } else {
            PushNote::Upload
        }
    }

    fn text(self) -> &'static str {
        match self {
            PushNote::Upload => " | upload",
            PushNote::ExistsAlready => " | exists already",
            PushNote::GetsModified => " | !!! gets modified !!!",
        }
    }

    fn colored(self) -> String {
        match self {
            PushNote::Upload => self.text().to_string(),
            PushNote::ExistsAlready => self.text().green().to_string(),
            PushNote::GetsModified => self.text().red().to_string(),
        }
    }
}

/// One line per node, indented by depth, with the push note right-aligned.
pub fn format_push_tree(tree: &DocumentTree, width: usize) -> String {
    let mut out = String::new();
    for &root in tree.roots() {
        push_tree_lines(tree, root, 0, width, &mut out);
        out.push('\n');
    }
    out
}

fn push_tree_lines(
    tree: &DocumentTree,
    handle: NodeHandle,
    depth: usize,
    width: usize,
    out: &mut String,
) {
    let node = tree.node(handle);
    let note = PushNote::of(node);
    let note_len = note.text().chars().count();
    let line = fit_line(&format!("{}{}", "  ".repeat(depth), node.name), width, note_len);
    out.push_str(&line);
    out.push_str(&note.colored());
    out.push('\n');
    for &child in tree.children(handle) {
        push_tree_lines(tree, child, depth + 1, width, out);
    }
}

/// Pad or cut `line` so that a note of `note_len` characters ends at `width`.
fn fit_line(line: &str, width: usize, note_len: usize) -> String {
    let room = width.saturating_sub(note_len);
    let len = line.chars().count();
    if len > room {
        let keep = room.saturating_sub(3);
        let mut cut: String = line.chars().take(keep).collect();
        cut.push_str("...");
        cut
    } else {
        format!("{line:<room$}")
    }
}

/// Plain indented listing of what a pull will materialize.
pub fn format_pull_tree(tree: &DocumentTree) -> String {
    let mut out = String::new();
    for handle in tree.iter() {
        let depth = tree.full_path(handle).matches('/').count();
        out.push_str(&"  ".repeat(depth));
        out.push_str(&tree.node(handle).name);
        out.push('\n');
    }
    out
}

/// Items dropped while building, if any.
pub fn format_build_report(report: &BuildReport) -> String {
    let mut out = String::new();
    for path in &report.unsupported {
        out.push_str(&format!("unsupported file type, ignored: {}\n", path.display()));
    }
    for path in &report.unreadable {
        out.push_str(&format!("unreadable, ignored: {}\n", path.display()));
    }
    for path in &report.empty_dirs {
        out.push_str(&format!("empty directory, ignored: {}\n", path.display()));
    }
    for anchor in &report.missing_anchors {
        out.push_str(&format!("cannot find {}, skipping\n", anchor));
    }
    for anchor in &report.ambiguous_anchors {
        out.push_str(&format!("{} is ambiguous, used the first match\n", anchor));
    }
    if report.dropped() > 0 {
        out.push_str(&format!("{} item(s) dropped\n", report.dropped()));
    }
    out
}

pub fn format_push_outcome(outcome: &PushOutcome) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Uploaded", "Count"]);
    add_render_rows(&mut table, &outcome.rendered);
    table.add_row(vec!["removed".to_string(), outcome.removed.len().to_string()]);
    let mut out = format!("{}\n\n{}\n", format_section_heading("Push"), table);
    if outcome.restarted {
        out.push_str("document service restarted\n");
    }
    out
}

fn add_render_rows(table: &mut Table, rendered: &RenderReport) {
    table.add_row(vec!["collections".to_string(), rendered.collections.to_string()]);
    table.add_row(vec!["documents".to_string(), rendered.documents.to_string()]);
    table.add_row(vec!["payload only".to_string(), rendered.payload_only.to_string()]);
}

pub fn format_download_report(report: &DownloadReport) -> String {
    let mut out = String::new();
    for path in &report.rejected_names {
        out.push_str(&format!("unusable name, not downloaded: {}\n", path));
    }
    out.push_str(&format!(
        "{} directories created, {} documents downloaded, {} existing files skipped\n",
        report.directories,
        report.downloaded.len(),
        report.skipped_existing.len()
    ));
    out
}

/// Candidates of one duplicate group, newest marked as the default.
pub fn format_candidates(request: &SelectionRequest, position: usize, total: usize) -> String {
    let mut out = format!(
        "({:3}/{}) found {} duplicates for {}:\n",
        position + 1,
        total,
        request.candidates.len(),
        request.fingerprint
    );
    for (i, candidate) in request.candidates.iter().enumerate() {
        let prefix = if i == SelectionRequest::DEFAULT {
            "(* newest)"
        } else {
            "          "
        };
        out.push_str(&format!(
            "{} {}, id {}, modified {}, {}\n",
            prefix,
            i,
            candidate.id,
            candidate.modified_at(),
            candidate.path
        ));
    }
    out
}

pub fn format_cleanup_summary(report: &CleanupReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Pass", "Found", "Removed", "Skipped"]);
    for outcome in &report.outcomes {
        table.add_row(vec![
            outcome.pass.to_string(),
            outcome.found.to_string(),
            outcome.removed.len().to_string(),
            outcome.skipped.to_string(),
        ]);
    }
    format!("{}\n\n{}\n", format_section_heading("Cleanup"), table)
}
