//! # Search Expressions
//!
//! Composable predicate expressions evaluated against path entries while
//! listing or searching a database. Expressions form an immutable algebraic
//! tree: interior nodes are AND/OR/NOT and the constants, leaves are atomic
//! predicates carrying their pre-compiled state (a compiled regex, a parsed
//! shell pattern, a parsed size or time bound).
//!
//! Invalid expressions fail fast at construction time with
//! [`AjfsError::InvalidExpression`]; evaluation itself is pure and
//! infallible.

use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone};
use glob::{MatchOptions, Pattern};
use regex::Regex;

use crate::common::{hex_has_prefix, AjfsError, AjfsResult};
use crate::path_entry::{Flags, PathEntry};

/// Comparison direction of a parsed size expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SizeOp {
    Greater,
    Less,
    Equal,
}

/// A parsed `[+|-]<n>[k|m|g|t|p]` size bound (scale is x1000 per step).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SizeBound {
    pub op: SizeOp,
    pub bytes: u64,
}

impl SizeBound {
    /// Parses a size expression. `+` means greater-than, `-` less-than,
    /// no prefix means exact equality.
    pub fn parse(expression: &str) -> AjfsResult<Self> {
        let invalid =
            || AjfsError::InvalidExpression(format!("invalid size expression: {expression}"));
        let mut rest = expression.trim();
        let op = match rest.as_bytes().first() {
            Some(b'+') => {
                rest = &rest[1..];
                SizeOp::Greater
            }
            Some(b'-') => {
                rest = &rest[1..];
                SizeOp::Less
            }
            _ => SizeOp::Equal,
        };
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(invalid());
        }
        let number: u64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        let scale = match rest[digits_end..].to_ascii_lowercase().as_str() {
            "" => 1u64,
            "k" => 1000,
            "m" => 1000_u64.pow(2),
            "g" => 1000_u64.pow(3),
            "t" => 1000_u64.pow(4),
            "p" => 1000_u64.pow(5),
            _ => return Err(invalid()),
        };
        Ok(Self {
            op,
            bytes: number.saturating_mul(scale),
        })
    }

    pub fn matches(&self, size: u64) -> bool {
        match self.op {
            SizeOp::Greater => size > self.bytes,
            SizeOp::Less => size < self.bytes,
            SizeOp::Equal => size == self.bytes,
        }
    }
}

/// Parses a modification-time expression.
///
/// Absolute forms: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY-MM-DDTHH:MM:SS`, or `HH:MM:SS` (today's date implied). Relative
/// offsets `<n>{s|m|h|D|M|Y}` count back from `now` and are only permitted
/// when `allow_relative` is set (the *before* form).
pub fn parse_time_expr(
    expression: &str,
    now: DateTime<FixedOffset>,
    allow_relative: bool,
) -> AjfsResult<DateTime<FixedOffset>> {
    let invalid =
        || AjfsError::InvalidExpression(format!("invalid time expression: {expression}"));
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(invalid());
    }

    if let Some(timestamp) = parse_relative(expression, now) {
        return if allow_relative {
            Ok(timestamp)
        } else {
            Err(AjfsError::InvalidExpression(format!(
                "relative time {expression} is only valid with a before bound"
            )))
        };
    }

    let naive = if let Ok(datetime) =
        NaiveDateTime::parse_from_str(expression, "%Y-%m-%d %H:%M:%S")
    {
        datetime
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(expression, "%Y-%m-%dT%H:%M:%S") {
        datetime
    } else if let Ok(date) = NaiveDate::parse_from_str(expression, "%Y-%m-%d") {
        date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?
    } else if let Ok(time) = NaiveTime::parse_from_str(expression, "%H:%M:%S") {
        now.date_naive().and_time(time)
    } else {
        return Err(invalid());
    };
    match now.offset().from_local_datetime(&naive) {
        chrono::LocalResult::Single(timestamp) => Ok(timestamp),
        _ => Err(invalid()),
    }
}

fn parse_relative(
    expression: &str,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    if !expression.is_ascii() {
        return None;
    }
    let (digits, suffix) = expression.split_at(expression.len().checked_sub(1)?);
    let amount: i64 = digits.parse().ok()?;
    if amount < 0 {
        return None;
    }
    match suffix {
        "s" => now.checked_sub_signed(Duration::seconds(amount)),
        "m" => now.checked_sub_signed(Duration::minutes(amount)),
        "h" => now.checked_sub_signed(Duration::hours(amount)),
        "D" => now.checked_sub_signed(Duration::days(amount)),
        "M" => now.checked_sub_months(Months::new(amount as u32)),
        "Y" => now.checked_sub_months(Months::new(amount as u32 * 12)),
        _ => None,
    }
}

/// An immutable search expression tree.
#[derive(Debug, Clone)]
pub enum SearchExpr {
    /// Matches every entry.
    Always,
    /// Matches nothing.
    Never,
    /// Short-circuiting conjunction.
    And(Box<SearchExpr>, Box<SearchExpr>),
    /// Short-circuiting disjunction.
    Or(Box<SearchExpr>, Box<SearchExpr>),
    Not(Box<SearchExpr>),
    /// Caller-supplied predicate.
    Func(fn(&PathEntry) -> bool),
    /// Regular expression matched anywhere in the relative path.
    Regex(Regex),
    /// Shell glob against the path or the basename.
    ShellPattern {
        pattern: Pattern,
        base_only: bool,
        case_insensitive: bool,
    },
    /// Any of the given type bits overlaps the entry's mode.
    Type(u32),
    Size(SizeBound),
    /// Case-insensitive hex prefix of the content digest.
    Hash(String),
    /// Case-insensitive hex prefix of the path identifier.
    Id(String),
    ModTimeBefore(DateTime<FixedOffset>),
    ModTimeAfter(DateTime<FixedOffset>),
}

impl SearchExpr {
    pub fn and(self, rhs: SearchExpr) -> SearchExpr {
        SearchExpr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: SearchExpr) -> SearchExpr {
        SearchExpr::Or(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> SearchExpr {
        SearchExpr::Not(Box::new(self))
    }

    /// Compiles a path regex leaf.
    pub fn regex(pattern: &str) -> AjfsResult<SearchExpr> {
        let regex = Regex::new(pattern).map_err(|e| {
            AjfsError::InvalidExpression(format!("invalid regex {pattern}: {e}"))
        })?;
        Ok(SearchExpr::Regex(regex))
    }

    /// Compiles a shell-glob leaf (`*`, `?`, `[...]`).
    pub fn shell_pattern(
        pattern: &str,
        base_only: bool,
        case_insensitive: bool,
    ) -> AjfsResult<SearchExpr> {
        let pattern = Pattern::new(pattern).map_err(|e| {
            AjfsError::InvalidExpression(format!("invalid shell pattern: {e}"))
        })?;
        Ok(SearchExpr::ShellPattern {
            pattern,
            base_only,
            case_insensitive,
        })
    }

    /// Type-flag leaf from a `d|f|l|p|s` selector character.
    pub fn entry_type(selector: &str) -> AjfsResult<SearchExpr> {
        let mut flags = 0u32;
        for c in selector.chars() {
            flags |= match c {
                'd' => Flags::Directory as u32,
                'f' => Flags::File as u32,
                'l' => Flags::Symlink as u32,
                'p' => Flags::Fifo as u32,
                's' => Flags::Socket as u32,
                'b' => Flags::Device as u32,
                _ => {
                    return Err(AjfsError::InvalidExpression(format!(
                        "unknown type selector: {c}"
                    )))
                }
            };
        }
        Ok(SearchExpr::Type(flags))
    }

    pub fn size(expression: &str) -> AjfsResult<SearchExpr> {
        Ok(SearchExpr::Size(SizeBound::parse(expression)?))
    }

    pub fn hash_prefix(prefix: &str) -> AjfsResult<SearchExpr> {
        Ok(SearchExpr::Hash(valid_hex_prefix(prefix)?))
    }

    pub fn id_prefix(prefix: &str) -> AjfsResult<SearchExpr> {
        Ok(SearchExpr::Id(valid_hex_prefix(prefix)?))
    }

    pub fn mod_time_before(
        expression: &str,
        now: DateTime<FixedOffset>,
    ) -> AjfsResult<SearchExpr> {
        Ok(SearchExpr::ModTimeBefore(parse_time_expr(
            expression, now, true,
        )?))
    }

    pub fn mod_time_after(
        expression: &str,
        now: DateTime<FixedOffset>,
    ) -> AjfsResult<SearchExpr> {
        Ok(SearchExpr::ModTimeAfter(parse_time_expr(
            expression, now, false,
        )?))
    }

    /// Evaluates the expression against an entry and its optional content
    /// digest. Evaluation is pure; hash leaves simply fail to match when no
    /// digest is streamed alongside the entry.
    pub fn matches(&self, entry: &PathEntry, digest: Option<&[u8]>) -> bool {
        match self {
            SearchExpr::Always => true,
            SearchExpr::Never => false,
            SearchExpr::And(lhs, rhs) => {
                lhs.matches(entry, digest) && rhs.matches(entry, digest)
            }
            SearchExpr::Or(lhs, rhs) => {
                lhs.matches(entry, digest) || rhs.matches(entry, digest)
            }
            SearchExpr::Not(inner) => !inner.matches(entry, digest),
            SearchExpr::Func(predicate) => predicate(entry),
            SearchExpr::Regex(regex) => regex.is_match(&entry.path),
            SearchExpr::ShellPattern {
                pattern,
                base_only,
                case_insensitive,
            } => {
                let options = MatchOptions {
                    case_sensitive: !case_insensitive,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                };
                let target = if *base_only {
                    entry.path.rsplit('/').next().unwrap_or(&entry.path)
                } else {
                    &entry.path
                };
                pattern.matches_with(target, options)
            }
            SearchExpr::Type(flags) => entry.mode & Flags::TypeMask & flags > 0,
            SearchExpr::Size(bound) => bound.matches(entry.size),
            SearchExpr::Hash(prefix) => {
                digest.is_some_and(|digest| hex_has_prefix(digest, prefix))
            }
            SearchExpr::Id(prefix) => hex_has_prefix(&entry.id, prefix),
            SearchExpr::ModTimeBefore(bound) => entry.mtime < *bound,
            SearchExpr::ModTimeAfter(bound) => entry.mtime > *bound,
        }
    }

    /// True when any leaf needs a content digest, so callers know to stream
    /// hashes alongside entries.
    pub fn requires_hash(&self) -> bool {
        match self {
            SearchExpr::Hash(_) => true,
            SearchExpr::And(lhs, rhs) | SearchExpr::Or(lhs, rhs) => {
                lhs.requires_hash() || rhs.requires_hash()
            }
            SearchExpr::Not(inner) => inner.requires_hash(),
            _ => false,
        }
    }
}

fn valid_hex_prefix(prefix: &str) -> AjfsResult<String> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AjfsError::InvalidExpression(format!(
            "invalid hex prefix: {prefix}"
        )));
    }
    Ok(prefix.to_ascii_lowercase())
}
