//! path arguments: validation at parse time, resolution at evaluation time

use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::types::{Pattern, Wildcard};
use crate::error::Error;
use crate::fs::{DirEntry, FileSystem};
use crate::game::GameType;

/// characters that make a `file()` or `active()` argument a regex rather than a path
const REGEX_MARKERS: &[char] = &[':', '*', '?', '<', '>', '|', '\\'];

/// characters that can never appear in a plain path argument
const INVALID_PATH_CHARS: &[char] = &['"', ':', '*', '?', '<', '>', '|'];

const GHOST_SUFFIX: &str = ".ghost";

/// true if the argument has to be read as a regex
pub(crate) fn is_regex(argument: &str) -> bool {
    argument.contains(REGEX_MARKERS)
}

/// validate a plain path argument; `\` is accepted as a directory separator
pub(crate) fn plain_path(argument: &str) -> Result<PathBuf, String> {
    if argument.contains(INVALID_PATH_CHARS) {
        return Err(format!(
            "\"{}\" contains characters that are not allowed in a path",
            argument
        ));
    }

    let path = PathBuf::from(argument.replace('\\', "/"));
    check_in_game_dir(&path)?;
    Ok(path)
}

/// validate a `dir/regex` argument; only the final segment may hold regex syntax
pub(crate) fn wildcard_path(argument: &str) -> Result<Wildcard, String> {
    if argument.ends_with('/') {
        return Err(format!(
            "the regex path \"{}\" ends in a directory separator",
            argument
        ));
    }

    let (parent, regex) = argument.rsplit_once('/').unwrap_or((".", argument));

    if parent.contains(REGEX_MARKERS) || parent.contains('"') {
        return Err(format!(
            "the parent directory \"{}\" of a regex path cannot contain wildcard characters",
            parent
        ));
    }

    let parent = PathBuf::from(parent);
    check_in_game_dir(&parent)?;

    let pattern = Pattern::anchored(regex).map_err(|e| regex_error(regex, &e))?;
    Ok(Wildcard::new(parent, pattern))
}

pub(crate) fn regex_error(source: &str, error: &regex::Error) -> String {
    // regex errors span several lines; keep only the summary
    let summary = error
        .to_string()
        .lines()
        .last()
        .unwrap_or_default()
        .trim()
        .to_string();
    format!("\"{}\" is not a valid regular expression: {}", source, summary)
}

/// paths are relative to the data directory and may reach its parent, no further up
fn check_in_game_dir(path: &Path) -> Result<(), String> {
    let mut depth: i32 = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < -1 {
                    return Err(format!(
                        "the path \"{}\" is outside the game directory",
                        path.display()
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "the path \"{}\" must be relative to the data directory",
                    path.display()
                ))
            }
        }
    }
    Ok(())
}

/// turns relative paths into paths under the session's data directories
#[derive(Debug, Clone, Copy)]
pub(crate) struct Resolver<'a> {
    pub fs: &'a dyn FileSystem,
    pub game: GameType,
    pub data_path: &'a Path,
    pub additional_data_paths: &'a [PathBuf],
}

impl<'a> Resolver<'a> {
    /// data directories in lookup order
    fn roots(&self) -> impl Iterator<Item = &'a Path> {
        self.additional_data_paths
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.data_path))
    }

    /// find the file a relative path refers to
    ///
    /// returns `None` if no data directory holds it under any accepted spelling.
    /// only a failure to access the data path itself is an error
    pub fn resolve(&self, relative: &Path) -> Result<Option<PathBuf>, Error> {
        for root in self.roots() {
            if let Some(found) = self.resolve_in(root, relative)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn resolve_in(&self, root: &Path, relative: &Path) -> Result<Option<PathBuf>, Error> {
        let candidate = root.join(relative);
        match self.fs.metadata(&candidate) {
            Ok(_) => return Ok(Some(candidate)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                let dir = candidate.parent().unwrap_or(root);
                self.inaccessible(dir, &candidate, e)?;
                return Ok(None);
            }
        }

        let (Some(parent), Some(name)) = (
            candidate.parent(),
            candidate.file_name().and_then(OsStr::to_str),
        ) else {
            return Ok(None);
        };

        let entries = match self.fs.read_dir(parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                self.inaccessible(parent, parent, e)?;
                return Ok(None);
            }
        };

        if let Some(found) = find_ignoring_case(&entries, name) {
            return Ok(Some(parent.join(found)));
        }

        if self.game.is_unghosted_plugin_path(relative) {
            let ghosted = format!("{}{}", name, GHOST_SUFFIX);
            if let Some(found) = find_ignoring_case(&entries, &ghosted) {
                return Ok(Some(parent.join(found)));
            }
        }

        Ok(None)
    }

    /// an access failure in the data path is an error, anywhere else it is no match
    fn inaccessible(&self, dir: &Path, path: &Path, error: io::Error) -> Result<(), Error> {
        if dir == self.data_path {
            return Err(Error::io(path, error));
        }

        tracing::warn!(path = %path.display(), error = %error, "could not access path, treating it as missing");
        Ok(())
    }

    /// names of entries matching a wildcard across all data directories
    ///
    /// ghosted plugins are reported under their unghosted names, and a name found
    /// in several data directories is only reported once
    pub fn matching_names(&self, wildcard: &Wildcard) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = Vec::new();

        for root in self.roots() {
            let dir = root.join(&wildcard.parent);

            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    self.inaccessible(&dir, &dir, e)?;
                    continue;
                }
            };

            for entry in entries {
                let Some(name) = entry.name.to_str() else {
                    continue;
                };
                let name = self.unghosted_name(name);

                if wildcard.is_match(name)
                    && !names.iter().any(|n| n.to_lowercase() == name.to_lowercase())
                {
                    names.push(name.to_string());
                }
            }
        }

        Ok(names)
    }

    fn unghosted_name<'n>(&self, name: &'n str) -> &'n str {
        if !self.game.is_plugin_path(Path::new(name)) {
            return name;
        }

        let len = name.len();
        if len > GHOST_SUFFIX.len() && name.is_char_boundary(len - GHOST_SUFFIX.len()) {
            let (stem, suffix) = name.split_at(len - GHOST_SUFFIX.len());
            if suffix.eq_ignore_ascii_case(GHOST_SUFFIX) {
                return stem;
            }
        }
        name
    }
}

fn find_ignoring_case<'e>(entries: &'e [DirEntry], name: &str) -> Option<&'e OsStr> {
    let wanted = name.to_lowercase();
    entries
        .iter()
        .find(|e| e.name.to_str().map(str::to_lowercase).as_deref() == Some(wanted.as_str()))
        .map(|e| e.name.as_os_str())
}
