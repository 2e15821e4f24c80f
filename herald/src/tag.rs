//! Tag sets and the tag-expression evaluator.
//!
//! A tag expression is a disjunction of terms. Each term is either a single
//! tag (satisfied when the entry carries it) or a group of tags that must all
//! be present:
//!
//! ```text
//! "a, b"                 a OR b
//! ["a", "b"]             a OR b
//! [("a", "c"), "b"]      (a AND c) OR b
//! [("b", "c")]           b AND c
//! ```
//!
//! Two literals are reserved: [`MATCH_ALL_TAG`] selects everything and
//! [`MATCH_ALWAYS_TAG`], when carried by an entry, makes that entry answer
//! every single-tag query.

use std::collections::BTreeSet;

use herald_url::parse_list;

/// Query literal that selects every entry.
pub const MATCH_ALL_TAG: &str = "all";

/// Entry tag that makes the entry match any single-tag query.
pub const MATCH_ALWAYS_TAG: &str = "always";

/// Tags attached to a notifier or config source.
pub type Tags = BTreeSet<String>;

/// Builds a tag set from comma/space separated strings.
pub fn tags<I, S>(inputs: I) -> Tags
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parse_list(inputs).into_iter().collect()
}

/// One OR-branch of a [`TagFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagTerm {
    /// A single literal.
    Tag(String),
    /// Every literal must be present on the entry.
    AllOf(Vec<String>),
}

impl TagTerm {
    pub fn all_of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllOf(tags.into_iter().map(Into::into).collect())
    }
}

/// A tag expression in disjunctive normal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    terms: Vec<TagTerm>,
}

impl TagFilter {
    /// The filter that selects every entry.
    pub fn all() -> Self {
        Self {
            terms: vec![TagTerm::Tag(MATCH_ALL_TAG.to_string())],
        }
    }

    pub fn new(terms: Vec<TagTerm>) -> Self {
        Self { terms }
    }

    /// Parses a comma-delimited list of OR-ed tags.
    pub fn parse(expression: &str) -> Self {
        Self {
            terms: parse_list([expression])
                .into_iter()
                .map(TagTerm::Tag)
                .collect(),
        }
    }

    /// Adds an OR-branch.
    pub fn or(mut self, term: TagTerm) -> Self {
        self.terms.push(term);
        self
    }

    pub fn terms(&self) -> &[TagTerm] {
        &self.terms
    }

    /// Evaluates the filter against `entry_tags` with the standard reserved
    /// literals. `match_always` toggles whether [`MATCH_ALWAYS_TAG`] entries
    /// are honored.
    pub fn matches(&self, entry_tags: &Tags, match_always: bool) -> bool {
        matches(
            self,
            entry_tags,
            MATCH_ALL_TAG,
            match_always.then_some(MATCH_ALWAYS_TAG),
        )
    }

    fn is_match_all(&self, match_all: &str) -> bool {
        matches!(self.terms.as_slice(), [TagTerm::Tag(tag)] if tag == match_all)
    }
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl From<&str> for TagFilter {
    fn from(expression: &str) -> Self {
        Self::parse(expression)
    }
}

impl From<Vec<TagTerm>> for TagFilter {
    fn from(terms: Vec<TagTerm>) -> Self {
        Self::new(terms)
    }
}

impl<const N: usize> From<[&str; N]> for TagFilter {
    fn from(tags: [&str; N]) -> Self {
        Self::new(tags.into_iter().map(|tag| TagTerm::Tag(tag.to_string())).collect())
    }
}

/// Evaluates `expression` against `entry_tags`.
///
/// An empty expression has no branch to satisfy and therefore only matches
/// entries that carry no tags at all.
pub fn matches(
    expression: &TagFilter,
    entry_tags: &Tags,
    match_all: &str,
    match_always: Option<&str>,
) -> bool {
    if expression.is_match_all(match_all) {
        return true;
    }
    if expression.terms.is_empty() {
        return entry_tags.is_empty();
    }

    let always = match_always.is_some_and(|token| entry_tags.contains(token));

    expression.terms.iter().any(|term| match term {
        TagTerm::Tag(tag) => entry_tags.contains(tag) || tag == match_all || always,
        TagTerm::AllOf(group) => {
            !group.is_empty() && group.iter().all(|tag| entry_tags.contains(tag))
        }
    })
}
