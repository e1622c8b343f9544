//! core types for the condition language

use std::fmt;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};

/// comparison operators accepted by the version functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// equality: ==
    Eq,
    /// inequality: !=
    Ne,
    /// greater than: >
    Gt,
    /// greater than or equal: >=
    Gte,
    /// less than: <
    Lt,
    /// less than or equal: <=
    Lte,
}

impl CompareOp {
    /// every operator, two-character tokens first so `<` never shadows `<=`
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lte,
        CompareOp::Gte,
        CompareOp::Lt,
        CompareOp::Gt,
    ];

    /// parse an operator from its token
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == s)
    }

    /// the token rule authors write for this operator
    pub fn token(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// apply the operator to the ordering of actual relative to expected
    pub fn matches(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Gte => ordering != Less,
            CompareOp::Lt => ordering == Less,
            CompareOp::Lte => ordering != Greater,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// a compiled, case-insensitive regex that remembers the text it was written as
///
/// equality compares that text, so two patterns parsed from the same source are equal
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// compile a pattern that must match a whole name
    pub fn anchored(source: &str) -> Result<Self, regex::Error> {
        Self::build(source, format!("^(?:{})$", source))
    }

    /// compile a pattern that may match anywhere in the text
    pub fn unanchored(source: &str) -> Result<Self, regex::Error> {
        Self::build(source, source.to_string())
    }

    fn build(source: &str, compiled: String) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(&compiled).case_insensitive(true).build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// the pattern as written in the condition
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// number of capture groups, not counting the implicit whole-match group
    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// the first capture group of a match, if the text matches
    pub fn first_group<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// a directory plus a pattern for the names of entries in it
#[derive(Debug, Clone, PartialEq)]
pub struct Wildcard {
    pub parent: PathBuf,
    pub pattern: Pattern,
}

impl Wildcard {
    pub fn new(parent: impl Into<PathBuf>, pattern: Pattern) -> Self {
        Self {
            parent: parent.into(),
            pattern,
        }
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parent == Path::new(".") {
            write!(f, "{}", self.pattern)
        } else {
            write!(f, "{}/{}", self.parent.display(), self.pattern)
        }
    }
}

/// either one exact file path or a wildcard over a directory's entries
#[derive(Debug, Clone, PartialEq)]
pub enum PathPattern {
    Exact(PathBuf),
    Wildcard(Wildcard),
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => write!(f, "{}", p.display()),
            PathPattern::Wildcard(w) => write!(f, "{}", w),
        }
    }
}

/// either one exact plugin name or a pattern over plugin names
#[derive(Debug, Clone, PartialEq)]
pub enum NamePattern {
    Exact(String),
    Regex(Pattern),
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamePattern::Exact(name) => write!(f, "{}", name),
            NamePattern::Regex(p) => write!(f, "{}", p),
        }
    }
}

/// where a version is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// plugin description or executable file version
    File,
    /// executable product version
    Product,
}

/// a leaf of the condition tree; arguments are validated at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// file("path")
    FileExists(PathPattern),
    /// file_size("path", size)
    FileSize { path: PathBuf, size: u64 },
    /// readable("path")
    Readable(PathBuf),
    /// is_executable("path")
    IsExecutable(PathBuf),
    /// active("name")
    ActivePlugin(NamePattern),
    /// is_master("name")
    IsMaster(PathBuf),
    /// many("dir/regex")
    ManyFiles(Wildcard),
    /// many_active("regex")
    ManyActivePlugins(Pattern),
    /// checksum("path", CRC)
    ChecksumEquals { path: PathBuf, crc: u32 },
    /// version("path", "ver", op) and product_version("path", "ver", op)
    VersionCompare {
        path: PathBuf,
        version: String,
        op: CompareOp,
        source: VersionSource,
    },
    /// filename_version("dir/regex", "ver", op)
    FilenameVersion {
        pattern: Wildcard,
        version: String,
        op: CompareOp,
    },
    /// description_contains("path", "regex")
    DescriptionContains { path: PathBuf, pattern: Pattern },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::FileExists(p) => write!(f, "file(\"{}\")", p),
            Predicate::FileSize { path, size } => {
                write!(f, "file_size(\"{}\", {})", path.display(), size)
            }
            Predicate::Readable(p) => write!(f, "readable(\"{}\")", p.display()),
            Predicate::IsExecutable(p) => write!(f, "is_executable(\"{}\")", p.display()),
            Predicate::ActivePlugin(n) => write!(f, "active(\"{}\")", n),
            Predicate::IsMaster(p) => write!(f, "is_master(\"{}\")", p.display()),
            Predicate::ManyFiles(w) => write!(f, "many(\"{}\")", w),
            Predicate::ManyActivePlugins(p) => write!(f, "many_active(\"{}\")", p),
            Predicate::ChecksumEquals { path, crc } => {
                write!(f, "checksum(\"{}\", {:08X})", path.display(), crc)
            }
            Predicate::VersionCompare {
                path,
                version,
                op,
                source,
            } => {
                let name = match source {
                    VersionSource::File => "version",
                    VersionSource::Product => "product_version",
                };
                write!(f, "{}(\"{}\", \"{}\", {})", name, path.display(), version, op)
            }
            Predicate::FilenameVersion {
                pattern,
                version,
                op,
            } => write!(f, "filename_version(\"{}\", \"{}\", {})", pattern, version, op),
            Predicate::DescriptionContains { path, pattern } => write!(
                f,
                "description_contains(\"{}\", \"{}\")",
                path.display(),
                pattern
            ),
        }
    }
}

/// the condition AST - represents a parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// all conditions must be true (AND)
    All(Vec<Condition>),
    /// any condition must be true (OR)
    Any(Vec<Condition>),
    /// negate a condition (NOT)
    Not(Box<Condition>),
    /// a function call
    Predicate(Predicate),
}

impl Condition {
    /// create an AND condition
    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::All(conditions)
    }

    /// create an OR condition
    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Any(conditions)
    }

    /// create a NOT condition
    pub fn negate(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// create a predicate condition
    pub fn predicate(predicate: Predicate) -> Self {
        Condition::Predicate(predicate)
    }

    /// how many levels of combinators sit above the deepest predicate
    pub fn depth(&self) -> usize {
        match self {
            Condition::All(c) | Condition::Any(c) => {
                1 + c.iter().map(Condition::depth).max().unwrap_or(0)
            }
            Condition::Not(inner) => 1 + inner.depth(),
            Condition::Predicate(_) => 0,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::All(conditions) => {
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " and ")?;
                    }
                    match c {
                        Condition::Any(_) => write!(f, "({})", c)?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                Ok(())
            }
            Condition::Any(conditions) => {
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{}", c)?;
                }
                Ok(())
            }
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Predicate(p) => write!(f, "not {}", p),
                other => write!(f, "not ({})", other),
            },
            Condition::Predicate(p) => write!(f, "{}", p),
        }
    }
}
