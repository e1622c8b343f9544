//! condition parser - converts expression text to a condition AST
//!
//! grammar:
//! - expression = compound ("or" compound)*
//! - compound = term ("and" term)*
//! - term = function | "not" (function | group) | group
//! - group = "(" expression ")"
//!
//! whitespace is allowed between tokens. string arguments are double-quoted and
//! `\"` is an escaped quote; any other backslash is kept as written so regexes
//! and windows paths need no doubling.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, hex_digit1, multispace0, satisfy},
    combinator::{cut, map, map_res, not, value},
    error::{context, ContextError, ErrorKind, FromExternalError},
    sequence::{preceded, terminated},
    IResult,
};

use super::path::{is_regex, plain_path, regex_error, wildcard_path};
use super::types::{
    CompareOp, Condition, NamePattern, PathPattern, Pattern, Predicate, VersionSource,
};

/// how deeply parentheses and `not` may nest
pub const MAX_NESTING_DEPTH: usize = 64;

/// every function the language knows, for suggestions
const FUNCTION_NAMES: [&str; 13] = [
    "file",
    "file_size",
    "readable",
    "is_executable",
    "active",
    "is_master",
    "many",
    "many_active",
    "checksum",
    "version",
    "product_version",
    "filename_version",
    "description_contains",
];

/// error type for parsing conditions
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// the whole expression
    pub input: String,
    /// the unparsed text where parsing stopped
    pub fragment: String,
    /// what was expected, or why the text there is invalid
    pub message: String,
}

impl ParseError {
    pub fn new(
        input: impl Into<String>,
        fragment: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            fragment: fragment.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "An error was encountered while parsing the expression \"{}\": {}",
            self.input, self.message
        )?;
        if self.fragment.is_empty() {
            write!(f, " at the end of the expression")
        } else {
            write!(f, " at \"{}\"", self.fragment)
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Reason {
    Kind(ErrorKind),
    Char(char),
    Context(&'static str),
    Message(String),
}

/// error threaded through the combinators
///
/// only the most specific reason is kept: a context label replaces a bare
/// combinator failure, and a message replaces both
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError<'a> {
    input: &'a str,
    reason: Reason,
}

impl<'a> SyntaxError<'a> {
    fn message(input: &'a str, message: impl Into<String>) -> Self {
        Self {
            input,
            reason: Reason::Message(message.into()),
        }
    }

    fn is_generic(&self) -> bool {
        matches!(self.reason, Reason::Kind(_) | Reason::Char(_))
    }

    fn into_parse_error(self, text: &str) -> ParseError {
        let message = match self.reason {
            Reason::Kind(kind) => format!("expected {}", kind.description().to_lowercase()),
            Reason::Char(c) => format!("expected '{}'", c),
            Reason::Context(label) => format!("expected {}", label),
            Reason::Message(m) => m,
        };
        ParseError::new(text, self.input, message)
    }
}

impl<'a> nom::error::ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self {
            input,
            reason: Reason::Kind(kind),
        }
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: &'a str, c: char) -> Self {
        Self {
            input,
            reason: Reason::Char(c),
        }
    }

    fn or(self, other: Self) -> Self {
        // keep whichever branch got further
        if other.input.len() <= self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for SyntaxError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        if other.is_generic() {
            Self {
                input,
                reason: Reason::Context(ctx),
            }
        } else {
            other
        }
    }
}

impl<'a, E: fmt::Display> FromExternalError<&'a str, E> for SyntaxError<'a> {
    fn from_external_error(input: &'a str, _: ErrorKind, e: E) -> Self {
        Self::message(input, e.to_string())
    }
}

pub(crate) type ParserResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

fn fail<T>(input: &str, message: impl Into<String>) -> ParserResult<'_, T> {
    Err(nom::Err::Failure(SyntaxError::message(input, message)))
}

/// parse expression text into a condition AST
///
/// # Returns
/// * `Ok(Condition)` - the parsed condition
/// * `Err(ParseError)` - the first syntax error, if any
#[tracing::instrument(level = "trace", skip(text))]
pub fn parse_condition(text: &str) -> Result<Condition, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::new(text, "", "the expression is empty"));
    }

    match terminated(|i| expression(i, 0), multispace0)(text) {
        Ok(("", condition)) => Ok(condition),
        Ok((rest, _)) => Err(ParseError::new(
            text,
            rest,
            "expected \"and\" or \"or\" between conditions",
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_parse_error(text)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(text, "", "unexpected end of input")),
    }
}

/// parse expression text given as raw bytes, which must be valid UTF-8
pub fn parse_condition_bytes(bytes: &[u8]) -> Result<Condition, ParseError> {
    parse_condition(decode_condition_text(bytes)?)
}

/// borrow raw expression bytes as text, failing like a parse would if they are
/// not valid UTF-8
pub fn decode_condition_text(bytes: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(bytes).map_err(|e| {
        ParseError::new(
            String::from_utf8_lossy(bytes),
            String::from_utf8_lossy(&bytes[e.valid_up_to()..]),
            "the expression is not valid UTF-8",
        )
    })
}

type Operand = fn(&str, usize) -> ParserResult<'_, Condition>;

/// one or more operands joined by a keyword; a single operand is returned unwrapped
fn joined<'a>(
    input: &'a str,
    depth: usize,
    keyword_text: &'static str,
    operand: Operand,
    combine: fn(Vec<Condition>) -> Condition,
) -> ParserResult<'a, Condition> {
    let (mut rest, first) = operand(input, depth)?;
    let mut operands = vec![first];

    loop {
        match preceded(multispace0, keyword(keyword_text))(rest) {
            Ok((after, _)) => {
                let (after, next) = cut(|i| operand(i, depth))(after)?;
                operands.push(next);
                rest = after;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    if operands.len() == 1 {
        Ok((rest, operands.remove(0)))
    } else {
        Ok((rest, combine(operands)))
    }
}

fn expression(input: &str, depth: usize) -> ParserResult<'_, Condition> {
    joined(input, depth, "or", compound, Condition::any)
}

fn compound(input: &str, depth: usize) -> ParserResult<'_, Condition> {
    joined(input, depth, "and", term, Condition::all)
}

fn term(input: &str, depth: usize) -> ParserResult<'_, Condition> {
    let (input, _) = multispace0(input)?;

    if let Ok((rest, _)) = keyword("not")(input) {
        check_depth(input, depth)?;
        let (rest, inner) = cut(context(
            "a function call or parenthesised expression after \"not\"",
            preceded(
                multispace0,
                alt((
                    |i| group(i, depth + 1),
                    map(function, Condition::Predicate),
                )),
            ),
        ))(rest)?;
        return Ok((rest, Condition::negate(inner)));
    }

    context(
        "a condition",
        alt((|i| group(i, depth), map(function, Condition::Predicate))),
    )(input)
}

fn group(input: &str, depth: usize) -> ParserResult<'_, Condition> {
    let (rest, _) = char('(')(input)?;
    check_depth(input, depth)?;

    let (rest, inner) = cut(|i| expression(i, depth + 1))(rest)?;
    let (rest, _) = cut(context(
        "a closing parenthesis",
        preceded(multispace0, char(')')),
    ))(rest)?;

    Ok((rest, inner))
}

fn check_depth(input: &str, depth: usize) -> ParserResult<'_, ()> {
    if depth >= MAX_NESTING_DEPTH {
        fail(
            input,
            format!(
                "the expression is nested more than {} levels deep",
                MAX_NESTING_DEPTH
            ),
        )
    } else {
        Ok((input, ()))
    }
}

/// a keyword that is not the start of a longer identifier
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> ParserResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_identifier_char)))
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[tracing::instrument(level = "trace", skip(input))]
fn function(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, name) = take_while1(is_identifier_char)(input)?;
    let (rest, _) = preceded(multispace0, char('('))(rest)?;

    let (rest, predicate) = match name {
        "file" => cut(file_args)(rest)?,
        "file_size" => cut(file_size_args)(rest)?,
        "readable" => cut(map(path_arg, Predicate::Readable))(rest)?,
        "is_executable" => cut(map(path_arg, Predicate::IsExecutable))(rest)?,
        "active" => cut(active_args)(rest)?,
        "is_master" => cut(map(path_arg, Predicate::IsMaster))(rest)?,
        "many" => cut(many_args)(rest)?,
        "many_active" => cut(many_active_args)(rest)?,
        "checksum" => cut(checksum_args)(rest)?,
        "version" => cut(|i| version_args(i, VersionSource::File))(rest)?,
        "product_version" => cut(|i| version_args(i, VersionSource::Product))(rest)?,
        "filename_version" => cut(filename_version_args)(rest)?,
        "description_contains" => cut(description_contains_args)(rest)?,
        _ => return fail(input, unknown_function(name)),
    };

    let (rest, _) = cut(context(
        "a closing parenthesis after the function arguments",
        preceded(multispace0, char(')')),
    ))(rest)?;

    Ok((rest, predicate))
}

fn unknown_function(name: &str) -> String {
    let closest = FUNCTION_NAMES
        .iter()
        .map(|candidate| (strsim::levenshtein(name, candidate), *candidate))
        .min();

    match closest {
        Some((distance, candidate)) if distance <= 3 => format!(
            "unknown function \"{}\", did you mean \"{}\"?",
            name, candidate
        ),
        _ => format!("unknown function \"{}\"", name),
    }
}

/// a double-quoted string argument
fn string(input: &str) -> ParserResult<'_, String> {
    let (start, _) = multispace0(input)?;
    let (body, _) = context("a quoted string", char('"'))(start)?;

    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&body[i + 1..], value)),
            '\\' if matches!(chars.peek(), Some((_, '"'))) => {
                value.push('"');
                chars.next();
            }
            c => value.push(c),
        }
    }

    fail(start, "unterminated string")
}

/// a string argument checked by `validate`; failures point at the argument
fn validated<T>(
    input: &str,
    validate: impl FnOnce(&str) -> Result<T, String>,
) -> ParserResult<'_, T> {
    let (rest, s) = string(input)?;
    match validate(&s) {
        Ok(v) => Ok((rest, v)),
        Err(message) => fail(input.trim_start(), message),
    }
}

fn comma(input: &str) -> ParserResult<'_, char> {
    context(
        "a comma between arguments",
        preceded(multispace0, char(',')),
    )(input)
}

fn path_arg(input: &str) -> ParserResult<'_, std::path::PathBuf> {
    validated(input, plain_path)
}

fn operator(input: &str) -> ParserResult<'_, CompareOp> {
    context(
        "a comparison operator",
        preceded(
            multispace0,
            alt((
                value(CompareOp::Eq, tag("==")),
                value(CompareOp::Ne, tag("!=")),
                value(CompareOp::Lte, tag("<=")),
                value(CompareOp::Gte, tag(">=")),
                value(CompareOp::Lt, tag("<")),
                value(CompareOp::Gt, tag(">")),
            )),
        ),
    )(input)
}

fn file_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, pattern) = validated(input, |s| {
        if is_regex(s) {
            wildcard_path(s).map(PathPattern::Wildcard)
        } else {
            plain_path(s).map(PathPattern::Exact)
        }
    })?;
    Ok((rest, Predicate::FileExists(pattern)))
}

fn file_size_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, path) = path_arg(input)?;
    let (rest, _) = comma(rest)?;
    let (rest, size) = context(
        "a file size in bytes",
        preceded(multispace0, map_res(digit1, str::parse::<u64>)),
    )(rest)?;
    Ok((rest, Predicate::FileSize { path, size }))
}

fn active_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, name) = validated(input, |s| {
        if is_regex(s) {
            Pattern::anchored(s)
                .map(NamePattern::Regex)
                .map_err(|e| regex_error(s, &e))
        } else {
            Ok(NamePattern::Exact(s.to_string()))
        }
    })?;
    Ok((rest, Predicate::ActivePlugin(name)))
}

fn many_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, wildcard) = validated(input, wildcard_path)?;
    Ok((rest, Predicate::ManyFiles(wildcard)))
}

fn many_active_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, pattern) =
        validated(input, |s| Pattern::anchored(s).map_err(|e| regex_error(s, &e)))?;
    Ok((rest, Predicate::ManyActivePlugins(pattern)))
}

fn checksum_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, path) = path_arg(input)?;
    let (rest, _) = comma(rest)?;
    let (start, _) = multispace0(rest)?;
    let (rest, digits) = context("a hexadecimal checksum", hex_digit1)(start)?;

    match u32::from_str_radix(digits, 16) {
        Ok(crc) => Ok((rest, Predicate::ChecksumEquals { path, crc })),
        Err(_) => fail(
            start,
            format!("\"{}\" is too large to be a 32-bit checksum", digits),
        ),
    }
}

fn version_args(input: &str, source: VersionSource) -> ParserResult<'_, Predicate> {
    let (rest, path) = path_arg(input)?;
    let (rest, _) = comma(rest)?;
    let (rest, version) = string(rest)?;
    let (rest, _) = comma(rest)?;
    let (rest, op) = operator(rest)?;

    Ok((
        rest,
        Predicate::VersionCompare {
            path,
            version,
            op,
            source,
        },
    ))
}

fn filename_version_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, pattern) = validated(input, |s| {
        let wildcard = wildcard_path(s)?;
        if wildcard.pattern.group_count() == 1 {
            Ok(wildcard)
        } else {
            Err(format!(
                "the regex \"{}\" must contain exactly one capture group for the version",
                wildcard.pattern
            ))
        }
    })?;
    let (rest, _) = comma(rest)?;
    let (rest, version) = string(rest)?;
    let (rest, _) = comma(rest)?;
    let (rest, op) = operator(rest)?;

    Ok((
        rest,
        Predicate::FilenameVersion {
            pattern,
            version,
            op,
        },
    ))
}

fn description_contains_args(input: &str) -> ParserResult<'_, Predicate> {
    let (rest, path) = path_arg(input)?;
    let (rest, _) = comma(rest)?;
    let (rest, pattern) =
        validated(rest, |s| Pattern::unanchored(s).map_err(|e| regex_error(s, &e)))?;
    Ok((rest, Predicate::DescriptionContains { path, pattern }))
}

impl std::str::FromStr for Condition {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_condition(s)
    }
}
