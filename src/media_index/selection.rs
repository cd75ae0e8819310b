//! Query predicates over the media index.
//!
//! A [`Selection`] is built once and rendered two ways: as a SQL `WHERE`
//! clause with bind arguments for the SQLite index, and as an in-process
//! predicate with the same semantics (used by in-memory indexes).
//!
//! Exact paths compare byte for byte (`path = ?`). Folder prefixes follow
//! SQLite `LIKE`: ASCII case-insensitive, `%` as the only wildcard we emit.
//! Literal `%`, `_` and `\` inside a folder are escaped so a folder called
//! `50%_off` does not act as a pattern.

use super::IndexRow;

/// Escape character used in every emitted `LIKE` clause.
pub const LIKE_ESCAPE: char = '\\';

/// A path constraint: an exact path or a folder prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    literal: String,
    prefix: bool,
}

impl PathPattern {
    /// Matches paths starting with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            literal: prefix.into(),
            prefix: true,
        }
    }

    /// Matches exactly `path`, case included.
    pub fn exact(path: impl Into<String>) -> Self {
        Self {
            literal: path.into(),
            prefix: false,
        }
    }

    /// The bind argument for `path LIKE ? ESCAPE '\'`.
    pub fn to_like_arg(&self) -> String {
        let mut arg = escape_like(&self.literal);
        if self.prefix {
            arg.push('%');
        }
        arg
    }

    /// SQL predicate on the `path` column and its bind argument.
    pub fn to_sql(&self) -> (String, String) {
        if self.prefix {
            (
                format!("path LIKE ? ESCAPE '{LIKE_ESCAPE}'"),
                self.to_like_arg(),
            )
        } else {
            ("path = ?".to_string(), self.literal.clone())
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        if !self.prefix {
            return path == self.literal;
        }
        let (literal, path) = (self.literal.as_bytes(), path.as_bytes());
        path.len() >= literal.len() && path[..literal.len()].eq_ignore_ascii_case(literal)
    }
}

/// Escape `LIKE` metacharacters in a literal.
pub fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Predicate for a media index query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    music_only: bool,
    path: Option<PathPattern>,
    excluded: Vec<PathPattern>,
}

impl Selection {
    /// Every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows flagged as music (`is_music != 0`).
    pub fn music() -> Self {
        Self {
            music_only: true,
            ..Self::default()
        }
    }

    /// Rows whose path starts with `folder`.
    pub fn under_folder(folder: impl Into<String>) -> Self {
        Self::all().with_path(PathPattern::prefix(folder))
    }

    /// The row for exactly this path.
    pub fn exact_path(path: impl Into<String>) -> Self {
        Self::all().with_path(PathPattern::exact(path))
    }

    pub fn with_path(mut self, pattern: PathPattern) -> Self {
        self.path = Some(pattern);
        self
    }

    /// Add an `AND NOT path LIKE '<folder>%'` exclusion.
    pub fn excluding_folder(mut self, folder: impl Into<String>) -> Self {
        self.excluded.push(PathPattern::prefix(folder));
        self
    }

    /// One exclusion per folder.
    pub fn excluding_folders<I, S>(self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        folders
            .into_iter()
            .fold(self, |selection, folder| selection.excluding_folder(folder))
    }

    /// Render as a SQL predicate plus bind arguments.
    ///
    /// Returns `None` when the selection places no constraint.
    pub fn to_sql(&self) -> Option<(String, Vec<String>)> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        if self.music_only {
            clauses.push("is_music != 0".to_string());
        }
        if let Some(pattern) = &self.path {
            let (clause, arg) = pattern.to_sql();
            clauses.push(clause);
            args.push(arg);
        }
        for pattern in &self.excluded {
            let (clause, arg) = pattern.to_sql();
            clauses.push(format!("NOT {clause}"));
            args.push(arg);
        }

        if clauses.is_empty() {
            None
        } else {
            Some((clauses.join(" AND "), args))
        }
    }

    /// Evaluate against a row in process.
    pub fn matches(&self, row: &IndexRow) -> bool {
        if self.music_only && !row.is_music {
            return false;
        }
        if let Some(pattern) = &self.path
            && !pattern.matches(&row.path)
        {
            return false;
        }
        !self.excluded.iter().any(|p| p.matches(&row.path))
    }
}
