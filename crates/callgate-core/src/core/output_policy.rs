// crates/callgate-core/src/core/output_policy.rs
// ============================================================================
// Module: Call Gate Output Policy
// Description: Field-path rules deciding what part of a result is exposed.
// Purpose: Parse path expressions and resolve the winning rule for a node.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! An [`OutputPolicy`] is an ordered list of `path expression -> action` rules.
//! Path expressions:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `*` (whole expression) | catch-all, matches every node |
//! | `.customer.email` | exact path (leading dot optional) |
//! | `.items[0].sku` | exact array index |
//! | `.customer.*` | single-level wildcard (any key or index) |
//! | `.items[].sku`, `.items[*].sku` | every element of an array |
//! | `..email`, `.customer..email` | field named `email` at any depth below |
//! | `.` | the root value itself |
//!
//! When several rules match a node the most specific wins: exact, then
//! array-element, then wildcard, then recursive-descent, then catch-all.
//! Within a class, more literal segments win, then the longer pattern, then
//! the rule declared first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use thiserror::Error;

// ============================================================================
// SECTION: Field Actions
// ============================================================================

/// Treatment applied to a matched node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAction {
    /// Expose the value unchanged.
    Allow,
    /// Expose a fixed-shape mask of the value.
    Mask,
    /// Remove the value (or whole subtree).
    Redact,
}

impl FieldAction {
    /// Returns the stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Mask => "mask",
            Self::Redact => "redact",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing output policy expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Path expression is malformed.
    #[error("invalid path expression {expression:?}: {reason}")]
    InvalidPath {
        /// Offending expression.
        expression: String,
        /// Parse failure description.
        reason: &'static str,
    },
    /// The same expression was declared twice.
    #[error("duplicate path expression {0:?}")]
    DuplicatePath(String),
}

// ============================================================================
// SECTION: Concrete Paths
// ============================================================================

/// One step of a concrete location inside a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Renders a concrete path as `.a.b[2].c` (the root renders as `.`).
#[must_use]
pub fn render_path(path: &[PathStep]) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let mut out = String::new();
    for step in path {
        match step {
            PathStep::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathStep::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

// ============================================================================
// SECTION: Path Patterns
// ============================================================================

/// One segment of a parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Literal object key.
    Key(String),
    /// Literal array index.
    Index(usize),
    /// Any single key or index.
    AnyOne,
    /// Any array element.
    EachElement,
    /// Zero or more steps followed by the named key.
    Descend(String),
}

/// Specificity class of a pattern, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SpecificityClass {
    /// Bare `*`.
    CatchAll,
    /// Contains a `..name` segment.
    Descent,
    /// Contains a `*` segment.
    Wildcard,
    /// Contains a `[]` segment.
    ArrayElement,
    /// Only literal segments.
    Exact,
}

/// Parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    /// Expression as written.
    source: String,
    /// Parsed segments (empty for the root and for the catch-all).
    segments: Vec<Segment>,
    /// Whether the expression is the bare catch-all.
    catch_all: bool,
}

impl PathPattern {
    /// Parses a path expression.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPath`] when the expression is malformed.
    pub fn parse(expression: &str) -> Result<Self, PolicyError> {
        let trimmed = expression.trim();
        let invalid = |reason| PolicyError::InvalidPath {
            expression: expression.to_string(),
            reason,
        };
        if trimmed.is_empty() {
            return Err(invalid("empty expression"));
        }
        if trimmed == "*" {
            return Ok(Self {
                source: expression.to_string(),
                segments: Vec::new(),
                catch_all: true,
            });
        }
        let segments = parse_segments(trimmed).map_err(invalid)?;
        Ok(Self {
            source: expression.to_string(),
            segments,
            catch_all: false,
        })
    }

    /// Returns the expression as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true when the pattern matches the concrete path exactly.
    #[must_use]
    pub fn matches(&self, path: &[PathStep]) -> bool {
        self.catch_all || match_segments(&self.segments, path)
    }

    /// Returns the specificity class of this pattern.
    fn class(&self) -> SpecificityClass {
        if self.catch_all {
            return SpecificityClass::CatchAll;
        }
        let mut class = SpecificityClass::Exact;
        for segment in &self.segments {
            let candidate = match segment {
                Segment::Key(_) | Segment::Index(_) => SpecificityClass::Exact,
                Segment::EachElement => SpecificityClass::ArrayElement,
                Segment::AnyOne => SpecificityClass::Wildcard,
                Segment::Descend(_) => SpecificityClass::Descent,
            };
            class = class.min(candidate);
        }
        class
    }

    /// Number of segments that name a concrete key or index.
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| {
                matches!(segment, Segment::Key(_) | Segment::Index(_) | Segment::Descend(_))
            })
            .count()
    }

    /// Sort key: greater means more specific.
    fn rank(&self) -> (SpecificityClass, usize, usize) {
        (self.class(), self.literal_count(), self.segments.len())
    }
}

/// Splits an expression into segments.
fn parse_segments(expression: &str) -> Result<Vec<Segment>, &'static str> {
    let chars: Vec<char> = expression.chars().collect();
    let mut segments = Vec::new();
    let mut index = 0;
    let mut expect_name = !matches!(chars.first(), Some('.' | '['));
    while index < chars.len() {
        match chars[index] {
            '.' if chars.get(index + 1) == Some(&'.') => {
                index += 2;
                let name = read_name(&chars, &mut index);
                if name.is_empty() || name == "*" {
                    return Err("recursive descent requires a field name");
                }
                segments.push(Segment::Descend(name));
                expect_name = false;
            }
            '.' => {
                index += 1;
                if index == chars.len() {
                    if segments.is_empty() {
                        // "." alone addresses the root.
                        return Ok(segments);
                    }
                    return Err("trailing dot");
                }
                expect_name = true;
            }
            '[' => {
                let close = chars[index..]
                    .iter()
                    .position(|ch| *ch == ']')
                    .ok_or("unterminated bracket")?;
                let inner: String = chars[index + 1..index + close].iter().collect();
                let inner = inner.trim();
                if inner.is_empty() || inner == "*" {
                    segments.push(Segment::EachElement);
                } else {
                    let position =
                        inner.parse::<usize>().map_err(|_| "array index must be a number")?;
                    segments.push(Segment::Index(position));
                }
                index += close + 1;
                expect_name = false;
            }
            _ if expect_name => {
                let name = read_name(&chars, &mut index);
                if name.is_empty() {
                    return Err("empty segment");
                }
                if name == "*" {
                    segments.push(Segment::AnyOne);
                } else {
                    segments.push(Segment::Key(name));
                }
                expect_name = false;
            }
            _ => return Err("unexpected character"),
        }
    }
    if expect_name {
        return Err("empty segment");
    }
    Ok(segments)
}

/// Reads a key name up to the next `.` or `[`.
fn read_name(chars: &[char], index: &mut usize) -> String {
    let start = *index;
    while *index < chars.len() && chars[*index] != '.' && chars[*index] != '[' {
        *index += 1;
    }
    chars[start..*index].iter().collect::<String>().trim().to_string()
}

/// Backtracking matcher of pattern segments against concrete steps.
fn match_segments(pattern: &[Segment], path: &[PathStep]) -> bool {
    let Some((first, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match first {
        Segment::Key(key) => match path.split_first() {
            Some((PathStep::Key(actual), tail)) => actual == key && match_segments(rest, tail),
            _ => false,
        },
        Segment::Index(position) => match path.split_first() {
            Some((PathStep::Index(actual), tail)) => {
                actual == position && match_segments(rest, tail)
            }
            _ => false,
        },
        Segment::AnyOne => path.split_first().is_some_and(|(_, tail)| match_segments(rest, tail)),
        Segment::EachElement => match path.split_first() {
            Some((PathStep::Index(_), tail)) => match_segments(rest, tail),
            _ => false,
        },
        Segment::Descend(name) => path.iter().enumerate().any(|(offset, step)| {
            matches!(step, PathStep::Key(actual) if actual == name)
                && match_segments(rest, &path[offset + 1..])
        }),
    }
}

// ============================================================================
// SECTION: Output Policy
// ============================================================================

/// One declared policy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    /// Parsed path expression.
    pub pattern: PathPattern,
    /// Treatment for matched nodes.
    pub action: FieldAction,
}

/// Ordered field-path policy; anything unmatched is denied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputPolicy {
    /// Rules in declaration order.
    rules: Vec<PolicyRule>,
}

impl OutputPolicy {
    /// Builds a policy from `(expression, action)` pairs in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when an expression is malformed or repeated.
    pub fn from_rules<I, S>(rules: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (S, FieldAction)>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let mut parsed = Vec::new();
        for (expression, action) in rules {
            let expression = expression.as_ref();
            if !seen.insert(expression.trim().to_string()) {
                return Err(PolicyError::DuplicatePath(expression.to_string()));
            }
            parsed.push(PolicyRule {
                pattern: PathPattern::parse(expression)?,
                action,
            });
        }
        Ok(Self {
            rules: parsed,
        })
    }

    /// Returns the rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Returns the number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when the policy has no rules (everything is stripped).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolves the winning rule for a concrete path, if any rule matches.
    #[must_use]
    pub fn resolve(&self, path: &[PathStep]) -> Option<RuleMatch> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.pattern.matches(path))
            .max_by(|(left_index, left), (right_index, right)| {
                compare_rules(left, *left_index, right, *right_index)
            })
            .map(|(_, rule)| RuleMatch {
                action: rule.action,
                catch_all: rule.pattern.catch_all,
            })
    }
}

/// Winning rule for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    /// Action of the winning rule.
    pub action: FieldAction,
    /// Whether the winner is the bare catch-all (weaker than any inherited rule).
    pub catch_all: bool,
}

/// Orders two matching rules; the greater one wins.
fn compare_rules(
    left: &PolicyRule,
    left_index: usize,
    right: &PolicyRule,
    right_index: usize,
) -> Ordering {
    (left.pattern.rank(), Reverse(left_index)).cmp(&(right.pattern.rank(), Reverse(right_index)))
}

// ============================================================================
// SECTION: Serde
// ============================================================================

impl Serialize for OutputPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rules.len()))?;
        for rule in &self.rules {
            map.serialize_entry(rule.pattern.as_str(), &rule.action)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OutputPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PolicyVisitor)
    }
}

/// Visitor collecting map entries in document order.
struct PolicyVisitor;

impl<'de> Visitor<'de> for PolicyVisitor {
    type Value = OutputPolicy;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map from path expression to allow, mask or redact")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, FieldAction)> = Vec::new();
        while let Some((expression, action)) = access.next_entry::<String, FieldAction>()? {
            entries.push((expression, action));
        }
        OutputPolicy::from_rules(entries).map_err(serde::de::Error::custom)
    }
}
