//! core::entry
//!
//! Indentation-delimited record parser.
//!
//! # Format
//!
//! Record files are line oriented. The depth of a line is the number of
//! leading characters drawn from `{'-', ' '}`. Blank lines and lines whose
//! first non-space character is `#` are ignored and never affect depth.
//!
//! A line deeper than the current entry opens a child of it. A line at the
//! same or a shallower depth closes entries until it reaches the nearest
//! ancestor with a strictly smaller depth, and opens a new child there.
//!
//! A line whose prefix is only spaces, at exactly the depth of an entry
//! opened by a `-` bullet, continues that entry instead of opening a
//! sibling:
//!
//! ```text
//! - cell 1: sst
//!   biocytin +
//! ```
//!
//! # Storage
//!
//! Entries live in an arena ([`EntryTree`]) and refer to each other by
//! [`EntryId`]. Index 0 is a virtual root at depth `None`; its children are
//! the top-level records of the file.
//!
//! # Example
//!
//! ```
//! use synapdex::core::entry::EntryTree;
//!
//! let tree = EntryTree::parse_str("- A\n  - B\n  - C\n- D\n", None).unwrap();
//! let top = tree.top_level();
//! assert_eq!(top.len(), 2);
//! assert_eq!(tree[top[0]].lines(), ["A"]);
//! assert_eq!(tree[top[0]].children().len(), 2);
//! ```

use std::fs;
use std::ops::Index;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from parsing record text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read record file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("indentation mismatch at {location}: expected depth {expected}, found {found}: {text:?}")]
    Indentation {
        location: String,
        expected: usize,
        found: usize,
        text: String,
    },

    #[error("cannot add lines to the root entry")]
    RootLine,
}

/// Index of an entry in an [`EntryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

/// Count of leading `-` and space characters.
pub fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| *c == '-' || *c == ' ').count()
}

/// One node of the parse tree.
#[derive(Debug, Clone)]
pub struct Entry {
    depth: Option<usize>,
    bullet: bool,
    lines: Vec<String>,
    parent: Option<EntryId>,
    children: Vec<EntryId>,
    source: Option<PathBuf>,
    line_number: usize,
}

impl Entry {
    /// Indentation depth; `None` only for the virtual root.
    pub fn depth(&self) -> Option<usize> {
        self.depth
    }

    /// Content lines with the indentation prefix and trailing whitespace removed.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// First content line, or `""` for the root.
    pub fn head(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    /// Absolute path of the file this entry was read from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 1-based line number of the entry's first line.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// `file:line` for diagnostics.
    pub fn location(&self) -> String {
        match &self.source {
            Some(path) => format!("{}:{}", path.display(), self.line_number),
            None => format!("line {}", self.line_number),
        }
    }
}

/// Arena-backed tree of parsed entries.
#[derive(Debug, Clone)]
pub struct EntryTree {
    nodes: Vec<Entry>,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTree {
    /// Create a tree holding only the virtual root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Entry {
                depth: None,
                bullet: false,
                lines: Vec::new(),
                parent: None,
                children: Vec::new(),
                source: None,
                line_number: 0,
            }],
        }
    }

    /// Read and parse a record file.
    ///
    /// Entry provenance records the absolute path of `path`.
    pub fn parse_file(path: &Path) -> Result<Self, ParseError> {
        let text = fs::read_to_string(path).map_err(|e| ParseError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let source = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self::parse_str(&text, Some(&source))
    }

    /// Parse record text. `source` is only used for provenance.
    pub fn parse_str(text: &str, source: Option<&Path>) -> Result<Self, ParseError> {
        Self::parse_lines(text.lines(), source)
    }

    /// Parse a sequence of raw lines.
    pub fn parse_lines<I, S>(lines: I, source: Option<&Path>) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        let mut current = tree.root();

        for (index, raw) in lines.into_iter().enumerate() {
            let line = raw.as_ref();
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let depth = indentation(line);
            let bullet = line[..depth].contains('-');
            let line_number = index + 1;

            if !bullet && tree.continues(current, depth) {
                tree.add_line(current, line)?;
                continue;
            }

            let mut parent = current;
            while tree[parent].depth.is_some_and(|d| d >= depth) {
                // Only the root has no parent and its depth is None.
                parent = match tree[parent].parent {
                    Some(p) => p,
                    None => break,
                };
            }

            current = tree.push(parent, line, depth, bullet, source, line_number);
        }

        Ok(tree)
    }

    fn continues(&self, current: EntryId, depth: usize) -> bool {
        let entry = &self[current];
        entry.bullet && entry.depth == Some(depth)
    }

    fn push(
        &mut self,
        parent: EntryId,
        line: &str,
        depth: usize,
        bullet: bool,
        source: Option<&Path>,
        line_number: usize,
    ) -> EntryId {
        let id = EntryId(self.nodes.len());
        self.nodes.push(Entry {
            depth: Some(depth),
            bullet,
            lines: vec![strip(line, depth)],
            parent: Some(parent),
            children: Vec::new(),
            source: source.map(Path::to_path_buf),
            line_number,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append a content line to an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Indentation` if the line's depth differs from the
    /// entry's depth, and `ParseError::RootLine` for the root.
    pub fn add_line(&mut self, id: EntryId, line: &str) -> Result<(), ParseError> {
        let entry = &mut self.nodes[id.0];
        let expected = entry.depth.ok_or(ParseError::RootLine)?;
        let found = indentation(line);
        if found != expected {
            return Err(ParseError::Indentation {
                location: entry.location(),
                expected,
                found,
                text: line.to_string(),
            });
        }
        entry.lines.push(strip(line, expected));
        Ok(())
    }

    /// The virtual root.
    pub fn root(&self) -> EntryId {
        EntryId(0)
    }

    /// Children of the root: one per record in the file.
    pub fn top_level(&self) -> &[EntryId] {
        &self.nodes[0].children
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.nodes.get(id.0)
    }

    /// Number of entries, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries below `id`, depth first, in source order.
    pub fn descendants(&self, id: EntryId) -> Vec<EntryId> {
        let mut out = Vec::new();
        let mut stack: Vec<EntryId> = self[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self[next].children.iter().rev().copied());
        }
        out
    }

    /// Render a subtree, four spaces per depth level.
    pub fn render(&self, id: EntryId) -> String {
        let mut out = Vec::new();
        for node in std::iter::once(id).chain(self.descendants(id)) {
            let entry = &self[node];
            let pad = "    ".repeat(entry.depth.unwrap_or(0));
            out.extend(entry.lines.iter().map(|l| format!("{pad}{l}")));
        }
        out.join("\n")
    }
}

impl Index<EntryId> for EntryTree {
    type Output = Entry;

    fn index(&self, id: EntryId) -> &Entry {
        &self.nodes[id.0]
    }
}

fn strip(line: &str, depth: usize) -> String {
    line[depth..].trim_end().to_string()
}
