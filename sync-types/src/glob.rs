//! Subtree scoping for hashing and pulls.
//!
//! A [`Glob`] limits which items a hash walk or a remote pull touches.
//! Patterns are segment lists: an exact segment matches one id, the
//! recursive `**` wildcard matches any number of ids (including none).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ItemKind, SyncError, SyncableId};

/// One segment of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Matches exactly one id.
    Exact(SyncableId),
    /// Matches zero or more ids (`**`).
    Recursive,
}

/// A path pattern relative to the glob's base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern(Vec<Segment>);

impl Pattern {
    /// Build a pattern from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// The pattern matching everything under the base path.
    pub fn any() -> Self {
        Self(vec![Segment::Recursive])
    }

    /// Parse a pattern from its text form, e.g. `d:inbox/**` or `f:msg1`.
    ///
    /// Exact segments use the canonical id form (`f:`, `d:`, `b:` tags).
    pub fn parse(text: &str) -> Result<Self, SyncError> {
        let mut segments = Vec::new();
        for part in text.split('/') {
            if part == "**" {
                segments.push(Segment::Recursive);
                continue;
            }
            let (tag, name) = part
                .split_once(':')
                .ok_or_else(|| SyncError::Internal(format!("invalid glob segment: {part}")))?;
            let kind = match tag {
                "f" => ItemKind::File,
                "d" => ItemKind::Folder,
                "b" => ItemKind::Bundle,
                _ => return Err(SyncError::Internal(format!("invalid glob segment: {part}"))),
            };
            segments.push(Segment::Exact(SyncableId {
                kind,
                name: name.to_string(),
            }));
        }
        Ok(Self(segments))
    }

    /// Whether this pattern matches the relative path exactly.
    pub fn matches(&self, rel: &[SyncableId]) -> bool {
        Self::matches_impl(&self.0, rel)
    }

    /// Whether some strict extension of `rel` could still match, i.e.
    /// whether a traversal should descend into the item at `rel`.
    pub fn could_match_below(&self, rel: &[SyncableId]) -> bool {
        Self::could_match_below_impl(&self.0, rel)
    }

    /// Whether this pattern matches `rel` and every path below it
    /// (a trailing `**` consumed the rest).
    pub fn covers_subtree(&self, rel: &[SyncableId]) -> bool {
        Self::covers_subtree_impl(&self.0, rel)
    }

    fn matches_impl(pattern: &[Segment], rel: &[SyncableId]) -> bool {
        match (pattern.first(), rel.first()) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(Segment::Exact(want)), Some(have)) => {
                want == have && Self::matches_impl(&pattern[1..], &rel[1..])
            }
            (Some(Segment::Exact(_)), None) => false,
            (Some(Segment::Recursive), _) => {
                // `**` matches zero segments, or swallows one and stays.
                Self::matches_impl(&pattern[1..], rel)
                    || (!rel.is_empty() && Self::matches_impl(pattern, &rel[1..]))
            }
        }
    }

    fn could_match_below_impl(pattern: &[Segment], rel: &[SyncableId]) -> bool {
        match (pattern.first(), rel.first()) {
            // Pattern exhausted: nothing deeper can match.
            (None, _) => false,
            // Path exhausted with pattern remaining: a deeper path may match.
            (Some(_), None) => true,
            (Some(Segment::Exact(want)), Some(have)) => {
                want == have && Self::could_match_below_impl(&pattern[1..], &rel[1..])
            }
            (Some(Segment::Recursive), Some(_)) => true,
        }
    }

    fn covers_subtree_impl(pattern: &[Segment], rel: &[SyncableId]) -> bool {
        match (pattern.first(), rel.first()) {
            (Some(Segment::Recursive), None) => pattern.len() == 1,
            (Some(Segment::Exact(want)), Some(have)) => {
                want == have && Self::covers_subtree_impl(&pattern[1..], &rel[1..])
            }
            (Some(Segment::Recursive), Some(_)) => {
                Self::covers_subtree_impl(&pattern[1..], rel)
                    || Self::covers_subtree_impl(pattern, &rel[1..])
            }
            _ => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            match segment {
                Segment::Exact(id) => write!(f, "{}", id)?,
                Segment::Recursive => write!(f, "**")?,
            }
        }
        Ok(())
    }
}

/// A set of include patterns with optional excludes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glob {
    /// Patterns an item must match one of.
    pub include: Vec<Pattern>,
    /// Patterns that remove otherwise-included items.
    pub exclude: Vec<Pattern>,
}

impl Glob {
    /// A glob over include patterns with no excludes.
    pub fn new(include: Vec<Pattern>) -> Self {
        Self {
            include,
            exclude: Vec::new(),
        }
    }

    /// The glob matching the whole subtree.
    pub fn all() -> Self {
        Self::new(vec![Pattern::any()])
    }

    /// Add exclude patterns.
    pub fn with_exclude(mut self, exclude: Vec<Pattern>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Whether the item at `rel` (relative to the base path) is in scope.
    pub fn matches(&self, rel: &[SyncableId]) -> bool {
        self.include.iter().any(|p| p.matches(rel))
            && !self.exclude.iter().any(|p| p.matches(rel))
    }

    /// Whether a traversal should descend into the folder-like at `rel`.
    ///
    /// True when some include could still match deeper, unless an exclude
    /// already covers the entire subtree.
    pub fn should_descend(&self, rel: &[SyncableId]) -> bool {
        self.include.iter().any(|p| p.could_match_below(rel))
            && !self.exclude.iter().any(|p| p.covers_subtree(rel))
    }
}

impl Default for Glob {
    fn default() -> Self {
        Self::all()
    }
}
