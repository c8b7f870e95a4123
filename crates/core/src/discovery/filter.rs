//! Post-discovery filters
//!
//! Filters are applied by the launcher after every engine has discovered,
//! so their semantics do not depend on any engine. A test-bearing
//! descriptor is accepted when it matches at least one inclusion filter
//! (or there are none) and matches no exclusion filter.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

use super::TagExpression;
use crate::error::{Error, Result};
use crate::types::{TestDescriptor, TestTag, UniqueId};

/// Outcome of applying a filter to a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Included(String),
    Excluded(String),
}

impl FilterResult {
    pub fn included(&self) -> bool {
        matches!(self, FilterResult::Included(_))
    }

    pub fn excluded(&self) -> bool {
        !self.included()
    }

    pub fn reason(&self) -> &str {
        match self {
            FilterResult::Included(reason) | FilterResult::Excluded(reason) => reason,
        }
    }
}

/// Whether a filter selects or rejects matching descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// What a filter looks at
#[derive(Debug, Clone)]
pub enum FilterPredicate {
    /// Effective tags contain any of these
    AnyTag(BTreeSet<TestTag>),
    TagExpression(TagExpression),
    /// Declared class name fully matches any of these patterns
    ClassName(Vec<Regex>),
    /// Display name fully matches the pattern
    DisplayName(Regex),
    /// Unique id lies under this id
    UniqueIdPrefix(UniqueId),
}

impl FilterPredicate {
    fn matches(&self, candidate: &FilterCandidate<'_>) -> bool {
        match self {
            FilterPredicate::AnyTag(tags) => {
                tags.iter().any(|tag| candidate.effective_tags.contains(tag))
            }
            FilterPredicate::TagExpression(expression) => {
                expression.evaluate(candidate.effective_tags)
            }
            FilterPredicate::ClassName(patterns) => candidate
                .class_name
                .is_some_and(|class_name| patterns.iter().any(|p| p.is_match(class_name))),
            FilterPredicate::DisplayName(pattern) => {
                pattern.is_match(candidate.descriptor.display_name())
            }
            FilterPredicate::UniqueIdPrefix(prefix) => {
                candidate.descriptor.unique_id().has_prefix(prefix)
            }
        }
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterPredicate::AnyTag(tags) => {
                let names: Vec<_> = tags.iter().map(TestTag::name).collect();
                write!(f, "tags [{}]", names.join(", "))
            }
            FilterPredicate::TagExpression(expression) => {
                write!(f, "tag expression '{}'", expression.source())
            }
            FilterPredicate::ClassName(patterns) => {
                let patterns: Vec<_> = patterns.iter().map(original_pattern).collect();
                write!(f, "class name patterns [{}]", patterns.join(", "))
            }
            FilterPredicate::DisplayName(pattern) => {
                write!(f, "display name pattern '{}'", original_pattern(pattern))
            }
            FilterPredicate::UniqueIdPrefix(prefix) => write!(f, "unique id prefix {prefix}"),
        }
    }
}

/// What a filter sees of a descriptor
#[derive(Debug, Clone, Copy)]
pub struct FilterCandidate<'a> {
    pub descriptor: &'a TestDescriptor,
    /// Own tags plus the tags of every ancestor
    pub effective_tags: &'a BTreeSet<TestTag>,
    /// Class of the descriptor's own source, else of the nearest ancestor
    pub class_name: Option<&'a str>,
}

/// An inclusion or exclusion predicate applied uniformly by the launcher
#[derive(Debug, Clone)]
pub struct DiscoveryFilter {
    mode: FilterMode,
    predicate: FilterPredicate,
}

impl DiscoveryFilter {
    pub fn new(mode: FilterMode, predicate: FilterPredicate) -> Self {
        Self { mode, predicate }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn predicate(&self) -> &FilterPredicate {
        &self.predicate
    }

    /// Whether the predicate matches, regardless of mode
    pub fn matches(&self, candidate: &FilterCandidate<'_>) -> bool {
        self.predicate.matches(candidate)
    }

    /// Apply the filter, taking the mode into account
    pub fn apply(&self, candidate: &FilterCandidate<'_>) -> FilterResult {
        let matched = self.matches(candidate);
        match (self.mode, matched) {
            (FilterMode::Include, true) => FilterResult::Included(format!("matches {self}")),
            (FilterMode::Include, false) => {
                FilterResult::Excluded(format!("does not match {self}"))
            }
            (FilterMode::Exclude, true) => FilterResult::Excluded(format!("matches {self}")),
            (FilterMode::Exclude, false) => {
                FilterResult::Included(format!("does not match {self}"))
            }
        }
    }

    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DiscoveryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            FilterMode::Include => "include",
            FilterMode::Exclude => "exclude",
        };
        write!(f, "{mode} {}", self.predicate)
    }
}

/// Combine filters: at least one inclusion filter must match (if any
/// exist) and no exclusion filter may match.
pub fn evaluate_filters(
    filters: &[DiscoveryFilter],
    candidate: &FilterCandidate<'_>,
) -> FilterResult {
    if let Some(exclusion) = filters
        .iter()
        .filter(|filter| filter.mode == FilterMode::Exclude)
        .find(|filter| filter.matches(candidate))
    {
        return FilterResult::Excluded(format!("matches {exclusion}"));
    }

    let mut inclusions = filters
        .iter()
        .filter(|filter| filter.mode == FilterMode::Include)
        .peekable();
    if inclusions.peek().is_none() {
        return FilterResult::Included("no inclusion filters".to_string());
    }
    let mut described = Vec::new();
    for inclusion in inclusions {
        if inclusion.matches(candidate) {
            return FilterResult::Included(format!("matches {inclusion}"));
        }
        described.push(inclusion.to_string());
    }
    FilterResult::Excluded(format!("matches none of: {}", described.join("; ")))
}

pub fn include_tags<I, S>(tags: I) -> Result<DiscoveryFilter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(DiscoveryFilter::new(FilterMode::Include, FilterPredicate::AnyTag(tag_set(tags)?)))
}

pub fn exclude_tags<I, S>(tags: I) -> Result<DiscoveryFilter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(DiscoveryFilter::new(FilterMode::Exclude, FilterPredicate::AnyTag(tag_set(tags)?)))
}

pub fn include_tag_expression(expression: &str) -> Result<DiscoveryFilter> {
    Ok(DiscoveryFilter::new(
        FilterMode::Include,
        FilterPredicate::TagExpression(TagExpression::parse(expression)?),
    ))
}

pub fn exclude_tag_expression(expression: &str) -> Result<DiscoveryFilter> {
    Ok(DiscoveryFilter::new(
        FilterMode::Exclude,
        FilterPredicate::TagExpression(TagExpression::parse(expression)?),
    ))
}

pub fn include_class_name_patterns<I, S>(patterns: I) -> Result<DiscoveryFilter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(DiscoveryFilter::new(
        FilterMode::Include,
        FilterPredicate::ClassName(compile_all(patterns)?),
    ))
}

pub fn exclude_class_name_patterns<I, S>(patterns: I) -> Result<DiscoveryFilter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(DiscoveryFilter::new(
        FilterMode::Exclude,
        FilterPredicate::ClassName(compile_all(patterns)?),
    ))
}

pub fn include_display_name_pattern(pattern: &str) -> Result<DiscoveryFilter> {
    Ok(DiscoveryFilter::new(
        FilterMode::Include,
        FilterPredicate::DisplayName(compile_full_match(pattern)?),
    ))
}

pub fn exclude_display_name_pattern(pattern: &str) -> Result<DiscoveryFilter> {
    Ok(DiscoveryFilter::new(
        FilterMode::Exclude,
        FilterPredicate::DisplayName(compile_full_match(pattern)?),
    ))
}

pub fn include_unique_id_prefix(prefix: UniqueId) -> DiscoveryFilter {
    DiscoveryFilter::new(FilterMode::Include, FilterPredicate::UniqueIdPrefix(prefix))
}

pub fn exclude_unique_id_prefix(prefix: UniqueId) -> DiscoveryFilter {
    DiscoveryFilter::new(FilterMode::Exclude, FilterPredicate::UniqueIdPrefix(prefix))
}

fn tag_set<I, S>(tags: I) -> Result<BTreeSet<TestTag>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags = tags
        .into_iter()
        .map(|tag| TestTag::new(tag))
        .collect::<Result<BTreeSet<_>>>()?;
    if tags.is_empty() {
        return Err(Error::InvalidTag("tag filter needs at least one tag".to_string()));
    }
    Ok(tags)
}

fn compile_all<I, S>(patterns: I) -> Result<Vec<Regex>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let compiled = patterns
        .into_iter()
        .map(|pattern| compile_full_match(pattern.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    if compiled.is_empty() {
        return Err(Error::ConfigError(
            "class name filter needs at least one pattern".to_string(),
        ));
    }
    Ok(compiled)
}

// Patterns must match the whole name, not a substring
fn compile_full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern.trim()))?)
}

fn original_pattern(regex: &Regex) -> &str {
    let anchored = regex.as_str();
    anchored
        .strip_prefix("^(?:")
        .and_then(|rest| rest.strip_suffix(")$"))
        .unwrap_or(anchored)
}
