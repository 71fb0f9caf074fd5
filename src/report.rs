//! Console rendering of a finished size tree.
//!
//! The core hands back children in platform order and never filters them.
//! Ordering by size and folding small entries happen here.

use dirtally_core::FsNode;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Binary-prefixed size with one decimal up to MB and two from GB on.
pub fn format_size(bytes: i64) -> String {
    if bytes.unsigned_abs() < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let precision = if unit >= 3 { 2 } else { 1 };
    format!("{value:.precision$} {}", SIZE_UNITS[unit])
}

/// `1234567` as `1,234,567`.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.char_indices() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub struct TreeReport<'a> {
    /// Levels below the root to print; 0 prints the root only.
    pub depth: usize,
    /// Children smaller than this many bytes are folded into one line.
    pub threshold: i64,
    /// Full paths the scan could not list, as recorded by the session.
    pub inaccessible: &'a [String],
}

impl TreeReport<'_> {
    /// Render `root`, which was scanned from `root_path`.
    pub fn render(&self, root: &FsNode, root_path: &Path) -> String {
        let denied: HashSet<&str> = self.inaccessible.iter().map(String::as_str).collect();
        let mut out = String::new();
        self.render_node(&mut out, root, root_path, 0, &denied);
        out
    }

    fn render_node(
        &self,
        out: &mut String,
        node: &FsNode,
        path: &Path,
        level: usize,
        denied: &HashSet<&str>,
    ) {
        let indent = "  ".repeat(level);
        let suffix = if node.is_dir() { "/" } else { "" };
        let _ = write!(out, "{indent}{:>10}  {}{suffix}", format_size(node.size), node.name);
        let is_denied = denied.contains(&*path.to_string_lossy());
        match (is_denied, node.is_unscanned_dir()) {
            (true, true) => out.push_str("  <access denied>"),
            (true, false) => out.push_str("  <partially listed>"),
            (false, true) => out.push_str("  <not scanned>"),
            (false, false) => {}
        }
        out.push('\n');

        if level >= self.depth {
            return;
        }

        let mut children: Vec<&FsNode> = node.children().iter().collect();
        children.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.name.cmp(&b.name)));

        let small = children.iter().filter(|c| c.size < self.threshold).count();
        let fold = small > 1;
        let mut folded_bytes = 0i64;

        for child in children {
            if fold && child.size < self.threshold {
                folded_bytes += child.size;
                continue;
            }
            self.render_node(out, child, &path.join(child.name.as_str()), level + 1, denied);
        }

        if fold {
            let _ = writeln!(
                out,
                "{indent}  {:>10}  <{} smaller items>",
                format_size(folded_bytes),
                format_count(small as u64)
            );
        }
    }
}
