//! the condition language used by plugin rules
//!
//! provides:
//! - function calls that query files, plugins, versions and checksums
//! - logical operators: and, or, not, with parentheses for grouping
//! - comparison operators for versions: ==, !=, >, >=, <, <=
//!
//! conditions are parsed once into a [`Condition`] tree and then evaluated
//! against an [`EvalContext`].

mod eval;
mod parser;
mod path;
mod types;
pub mod version;

pub use eval::{evaluate, EvalContext, PluginState};
pub use parser::{
    decode_condition_text, parse_condition, parse_condition_bytes, ParseError, MAX_NESTING_DEPTH,
};
pub use types::{
    CompareOp, Condition, NamePattern, PathPattern, Pattern, Predicate, VersionSource, Wildcard,
};
