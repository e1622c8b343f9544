//! condition evaluator
//!
//! evaluates parsed conditions against a session's plugin state and the files
//! in its data directories

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use super::path::Resolver;
use super::types::{
    CompareOp, Condition, NamePattern, PathPattern, Pattern, Predicate, VersionSource,
};
use super::version;
use crate::error::Error;
use crate::executable;
use crate::fs::FileSystem;
use crate::game::GameType;
use crate::plugin::{self, PluginHeader};

/// a path argument that always exists
const LOOT_PATH: &str = "LOOT";

/// plugin state read during evaluation
///
/// each call copies what it needs, so an implementation never lends out its
/// internal state
pub trait PluginState {
    /// whether a plugin is active, ignoring case
    fn is_active(&self, name: &str) -> Result<bool, Error>;

    /// how many active plugins match the pattern
    fn count_active(&self, pattern: &Pattern) -> Result<usize, Error>;

    /// a caller-supplied version for a plugin
    fn version_override(&self, name: &str) -> Result<Option<String>, Error>;

    /// a caller-supplied or previously computed checksum
    fn crc(&self, name: &str) -> Result<Option<u32>, Error>;

    /// remember a computed checksum unless one is already known
    fn remember_crc(&self, name: &str, crc: u32) -> Result<(), Error>;
}

/// context for evaluating conditions
pub struct EvalContext<'a> {
    /// game whose plugin rules apply
    pub game: GameType,
    /// directory plugin paths are relative to
    pub data_path: &'a Path,
    /// directories checked before the data path
    pub additional_data_paths: &'a [PathBuf],
    /// where files are read from
    pub fs: &'a dyn FileSystem,
    /// active plugins, versions and checksums
    pub plugins: &'a dyn PluginState,
}

impl<'a> EvalContext<'a> {
    /// create a new evaluation context
    pub fn new(
        game: GameType,
        data_path: &'a Path,
        fs: &'a dyn FileSystem,
        plugins: &'a dyn PluginState,
    ) -> Self {
        Self {
            game,
            data_path,
            additional_data_paths: &[],
            fs,
            plugins,
        }
    }

    /// set the directories checked before the data path
    pub fn with_additional_data_paths(mut self, paths: &'a [PathBuf]) -> Self {
        self.additional_data_paths = paths;
        self
    }

    fn resolver(&self) -> Resolver<'a> {
        Resolver {
            fs: self.fs,
            game: self.game,
            data_path: self.data_path,
            additional_data_paths: self.additional_data_paths,
        }
    }
}

/// evaluate a condition against the given context
pub fn evaluate(condition: &Condition, ctx: &EvalContext) -> Result<bool, Error> {
    match condition {
        Condition::All(conditions) => {
            // empty All = true (vacuous truth)
            for c in conditions {
                if !evaluate(c, ctx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any(conditions) => {
            // empty Any = false
            for c in conditions {
                if evaluate(c, ctx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not(inner) => Ok(!evaluate(inner, ctx)?),
        Condition::Predicate(p) => {
            let result = evaluate_predicate(p, ctx)?;
            tracing::trace!(predicate = %p, result, "evaluated predicate");
            Ok(result)
        }
    }
}

fn evaluate_predicate(predicate: &Predicate, ctx: &EvalContext) -> Result<bool, Error> {
    match predicate {
        Predicate::FileExists(PathPattern::Exact(path)) => {
            Ok(path == Path::new(LOOT_PATH) || ctx.resolver().resolve(path)?.is_some())
        }
        Predicate::FileExists(PathPattern::Wildcard(wildcard)) => {
            Ok(!ctx.resolver().matching_names(wildcard)?.is_empty())
        }
        Predicate::FileSize { path, size } => evaluate_file_size(path, *size, ctx),
        Predicate::Readable(path) => evaluate_readable(path, ctx),
        Predicate::IsExecutable(path) => match ctx.resolver().resolve(path)? {
            Some(resolved) => {
                let reader = open(&resolved, ctx)?;
                executable::is_executable(reader).map_err(|e| Error::io(resolved, e))
            }
            None => Ok(false),
        },
        Predicate::ActivePlugin(NamePattern::Exact(name)) => ctx.plugins.is_active(name),
        Predicate::ActivePlugin(NamePattern::Regex(pattern)) => {
            Ok(ctx.plugins.count_active(pattern)? > 0)
        }
        Predicate::IsMaster(path) => evaluate_is_master(path, ctx),
        Predicate::ManyFiles(wildcard) => Ok(ctx.resolver().matching_names(wildcard)?.len() > 1),
        Predicate::ManyActivePlugins(pattern) => Ok(ctx.plugins.count_active(pattern)? > 1),
        Predicate::ChecksumEquals { path, crc } => evaluate_checksum(path, *crc, ctx),
        Predicate::VersionCompare {
            path,
            version,
            op,
            source,
        } => {
            let actual = match source {
                VersionSource::File => file_version(path, ctx)?,
                VersionSource::Product => product_version(path, ctx)?,
            };
            Ok(compare_version(actual.as_deref(), version, *op))
        }
        Predicate::FilenameVersion {
            pattern,
            version,
            op,
        } => {
            let names = ctx.resolver().matching_names(pattern)?;
            Ok(names.iter().any(|name| {
                pattern
                    .pattern
                    .first_group(name)
                    .map_or(false, |actual| op.matches(version::compare(actual, version)))
            }))
        }
        Predicate::DescriptionContains { path, pattern } => Ok(read_header(path, ctx)?
            .and_then(|h| h.description)
            .map_or(false, |d| pattern.is_match(&d))),
    }
}

/// an unknown version is lower than every version
fn compare_version(actual: Option<&str>, expected: &str, op: CompareOp) -> bool {
    match actual {
        Some(actual) => op.matches(version::compare(actual, expected)),
        None => matches!(op, CompareOp::Ne | CompareOp::Lt | CompareOp::Lte),
    }
}

fn evaluate_file_size(path: &Path, size: u64, ctx: &EvalContext) -> Result<bool, Error> {
    let Some(resolved) = ctx.resolver().resolve(path)? else {
        return Ok(false);
    };

    match ctx.fs.metadata(&resolved) {
        Ok(m) => Ok(m.is_file() && m.len == size),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(resolved, e)),
    }
}

fn evaluate_readable(path: &Path, ctx: &EvalContext) -> Result<bool, Error> {
    let Some(resolved) = ctx.resolver().resolve(path)? else {
        return Ok(false);
    };

    let readable = match ctx.fs.metadata(&resolved) {
        Ok(m) if m.is_dir() => ctx.fs.read_dir(&resolved).is_ok(),
        Ok(_) => ctx.fs.open(&resolved).is_ok(),
        Err(_) => false,
    };
    Ok(readable)
}

fn evaluate_is_master(path: &Path, ctx: &EvalContext) -> Result<bool, Error> {
    if !ctx.game.is_plugin_path(path) {
        return Ok(false);
    }

    if ctx.game == GameType::Morrowind {
        let is_esm = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("esm"));
        return Ok(is_esm && ctx.resolver().resolve(path)?.is_some());
    }

    Ok(read_header(path, ctx)?.map_or(false, |h| h.is_master))
}

fn evaluate_checksum(path: &Path, expected: u32, ctx: &EvalContext) -> Result<bool, Error> {
    let key = state_key(path);
    if let Some(known) = ctx.plugins.crc(&key)? {
        return Ok(known == expected);
    }

    let Some(resolved) = ctx.resolver().resolve(path)? else {
        return Ok(false);
    };
    if ctx.fs.metadata(&resolved).map_or(false, |m| m.is_dir()) {
        return Ok(false);
    }

    let actual = crc32(&resolved, ctx)?;
    ctx.plugins.remember_crc(&key, actual)?;
    Ok(actual == expected)
}

fn crc32(path: &Path, ctx: &EvalContext) -> Result<u32, Error> {
    let mut reader = open(path, ctx)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// plugin versions come from overrides or the header description; other files
/// are read as executables
fn file_version(path: &Path, ctx: &EvalContext) -> Result<Option<String>, Error> {
    if let Some(version) = ctx.plugins.version_override(&state_key(path))? {
        return Ok(Some(version));
    }

    if ctx.game.is_plugin_path(path) {
        return Ok(read_header(path, ctx)?.and_then(|h| h.version()));
    }

    Ok(executable_versions(path, ctx)?.map(|v| v.file))
}

fn product_version(path: &Path, ctx: &EvalContext) -> Result<Option<String>, Error> {
    Ok(executable_versions(path, ctx)?.map(|v| v.product))
}

fn executable_versions(
    path: &Path,
    ctx: &EvalContext,
) -> Result<Option<executable::ExecutableVersions>, Error> {
    let Some(resolved) = ctx.resolver().resolve(path)? else {
        return Ok(None);
    };

    let reader = open(&resolved, ctx)?;
    match executable::read_versions(reader) {
        Ok(Some(versions)) => Ok(Some(versions)),
        Ok(None) => {
            tracing::warn!(path = %resolved.display(), "no version information found, treating the version as unknown");
            Ok(None)
        }
        Err(executable::VersionError::Io(e)) => Err(Error::io(resolved, e)),
        Err(executable::VersionError::Malformed(message)) => Err(Error::Executable {
            path: resolved,
            message,
        }),
    }
}

/// the header of a plugin, or `None` if it is missing or not a valid plugin
fn read_header(path: &Path, ctx: &EvalContext) -> Result<Option<PluginHeader>, Error> {
    let Some(resolved) = ctx.resolver().resolve(path)? else {
        return Ok(None);
    };

    let reader = open(&resolved, ctx)?;
    match plugin::read_header(reader, ctx.game) {
        Ok(header) => Ok(Some(header)),
        Err(e) => {
            tracing::debug!(path = %resolved.display(), error = %e, "could not read plugin header");
            Ok(None)
        }
    }
}

fn open(path: &Path, ctx: &EvalContext) -> Result<Box<dyn Read + Send>, Error> {
    ctx.fs.open(path).map_err(|e| Error::io(path, e))
}

/// how a path argument is looked up in the version and checksum maps
fn state_key(path: &Path) -> String {
    let path: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    path.to_string_lossy().to_lowercase()
}
