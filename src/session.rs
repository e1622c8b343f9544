//! game state sessions
//!
//! a session owns the game's paths, the caller-supplied plugin state and a
//! cache of condition results. every replacement of plugin state clears the
//! cache. all of it sits behind one reader-writer lock. the caller-supplied
//! maps are shared copy-on-write, so an evaluation reads one consistent
//! snapshot of them without holding the lock while it touches the disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::cache::ConditionCache;
use crate::conditions::{self, Condition, EvalContext, Pattern};
use crate::error::{Error, ErrorRecord};
use crate::fs::{FileSystem, OsFileSystem};
use crate::game::GameType;

/// a collection argument whose length has been checked against the length the
/// caller declared for it
#[derive(Debug, Clone, Copy)]
pub struct Entries<'a, T> {
    items: &'a [T],
}

impl<'a, T> Entries<'a, T> {
    /// pair a possibly absent collection with its declared length
    ///
    /// absent with a non-zero length, present with a zero length, and a length
    /// that disagrees with the collection are all rejected. an absent
    /// collection with a zero length is empty
    pub fn checked(items: Option<&'a [T]>, declared_len: usize) -> Result<Self, Error> {
        match items {
            None if declared_len == 0 => Ok(Self { items: &[] }),
            None => Err(Error::InvalidArgument(format!(
                "no entries were given but {} were declared",
                declared_len
            ))),
            Some(_) if declared_len == 0 => Err(Error::InvalidArgument(
                "entries were given but their declared count is zero".to_string(),
            )),
            Some(items) if items.len() != declared_len => Err(Error::InvalidArgument(format!(
                "{} entries were given but {} were declared",
                items.len(),
                declared_len
            ))),
            Some(items) => Ok(Self { items }),
        }
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a, T> From<&'a [T]> for Entries<'a, T> {
    fn from(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<'a, T> From<&'a Vec<T>> for Entries<'a, T> {
    fn from(items: &'a Vec<T>) -> Self {
        Self { items }
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for Entries<'a, T> {
    fn from(items: &'a [T; N]) -> Self {
        Self { items }
    }
}

/// plugin names are matched ignoring case, and either slash separates directories
fn plugin_key(name: &str) -> String {
    name.replace('\\', "/").to_lowercase()
}

/// caller-supplied plugin state
#[derive(Debug, Default, Clone)]
struct PluginMaps {
    active: HashSet<String>,
    versions: HashMap<String, String>,
    crcs: HashMap<String, u32>,
}

#[derive(Debug, Default)]
struct SessionState {
    plugins: Arc<PluginMaps>,
    /// checksums computed from files, dropped when the caller replaces `crcs`
    computed_crcs: HashMap<String, u32>,
    cache: ConditionCache,
}

impl SessionState {
    fn plugins_mut(&mut self) -> &mut PluginMaps {
        Arc::make_mut(&mut self.plugins)
    }
}

/// the plugin state one evaluation sees
struct PluginSnapshot<'a> {
    plugins: Arc<PluginMaps>,
    state: &'a RwLock<SessionState>,
}

impl conditions::PluginState for PluginSnapshot<'_> {
    fn is_active(&self, name: &str) -> Result<bool, Error> {
        Ok(self.plugins.active.contains(&plugin_key(name)))
    }

    fn count_active(&self, pattern: &Pattern) -> Result<usize, Error> {
        Ok(self
            .plugins
            .active
            .iter()
            .filter(|name| pattern.is_match(name))
            .count())
    }

    fn version_override(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.plugins.versions.get(&plugin_key(name)).cloned())
    }

    fn crc(&self, name: &str) -> Result<Option<u32>, Error> {
        let key = plugin_key(name);
        if let Some(crc) = self.plugins.crcs.get(&key) {
            return Ok(Some(*crc));
        }
        Ok(self.state.read()?.computed_crcs.get(&key).copied())
    }

    fn remember_crc(&self, name: &str, crc: u32) -> Result<(), Error> {
        let mut state = self.state.write()?;
        state.computed_crcs.entry(plugin_key(name)).or_insert(crc);
        Ok(())
    }
}

/// one game's state plus its condition cache and error record
#[derive(Debug)]
pub struct Session {
    game: GameType,
    data_path: PathBuf,
    local_path: PathBuf,
    additional_data_paths: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
    state: RwLock<SessionState>,
    errors: ErrorRecord,
}

impl Session {
    /// create a session reading from the real filesystem
    ///
    /// the paths are not checked; a missing data directory only shows up as
    /// missing files during evaluation
    pub fn new(
        game: GameType,
        data_path: impl Into<PathBuf>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        let data_path = data_path.into();
        let local_path = local_path.into();
        debug!(%game, data_path = %data_path.display(), "creating session");

        Self {
            game,
            data_path,
            local_path,
            additional_data_paths: Vec::new(),
            fs: Arc::new(OsFileSystem),
            state: RwLock::new(SessionState::default()),
            errors: ErrorRecord::new(),
        }
    }

    /// read files through the given filesystem instead of the real one
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// directories searched, in order, before the data path
    pub fn with_additional_data_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.additional_data_paths = paths;
        self
    }

    pub fn game(&self) -> GameType {
        self.game
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn additional_data_paths(&self) -> &[PathBuf] {
        &self.additional_data_paths
    }

    /// replace the set of active plugins
    pub fn set_active_plugins<S: AsRef<str>>(&self, plugins: Entries<'_, S>) -> Result<(), Error> {
        let active = plugins
            .as_slice()
            .iter()
            .map(|name| plugin_key(name.as_ref()))
            .collect();

        self.errors
            .track(self.replace(|state| state.plugins_mut().active = active))
    }

    /// replace the plugin version overrides
    pub fn set_plugin_versions<N, V>(&self, versions: Entries<'_, (N, V)>) -> Result<(), Error>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let versions = versions
            .as_slice()
            .iter()
            .map(|(name, version)| (plugin_key(name.as_ref()), version.as_ref().to_string()))
            .collect();

        self.errors
            .track(self.replace(|state| state.plugins_mut().versions = versions))
    }

    /// replace the known plugin checksums, dropping any computed ones
    pub fn set_crc_cache<N: AsRef<str>>(&self, crcs: Entries<'_, (N, u32)>) -> Result<(), Error> {
        let crcs = crcs
            .as_slice()
            .iter()
            .map(|(name, crc)| (plugin_key(name.as_ref()), *crc))
            .collect();

        self.errors.track(self.replace(|state| {
            state.plugins_mut().crcs = crcs;
            state.computed_crcs.clear();
        }))
    }

    fn replace(&self, update: impl FnOnce(&mut SessionState)) -> Result<(), Error> {
        let mut state = self.state.write()?;
        update(&mut *state);
        state.cache.clear();
        debug!("plugin state replaced, condition cache cleared");
        Ok(())
    }

    /// forget every cached condition result
    pub fn clear_condition_cache(&self) -> Result<(), Error> {
        let result = self.state.write().map_err(Error::from).map(|mut state| {
            state.cache.clear();
            debug!("condition cache cleared");
        });

        self.errors.track(result)
    }

    /// check that the text is a valid condition
    pub fn parse(&self, text: &str) -> Result<Condition, Error> {
        self.errors
            .track(conditions::parse_condition(text).map_err(Error::from))
    }

    /// evaluate a condition, using the cached result for identical text
    pub fn evaluate(&self, text: &str) -> Result<bool, Error> {
        self.errors.track(self.evaluate_cached(text))
    }

    fn evaluate_cached(&self, text: &str) -> Result<bool, Error> {
        let (generation, plugins) = {
            let state = self.state.read()?;
            if let Some(result) = state.cache.get(text) {
                debug!(condition = text, result, "condition cache hit");
                return Ok(result);
            }
            (state.cache.generation(), Arc::clone(&state.plugins))
        };
        debug!(condition = text, "condition cache miss");

        let condition = conditions::parse_condition(text)?;
        let result = self.evaluate_with(&condition, plugins)?;

        let mut state = self.state.write()?;
        if !state.cache.insert(generation, text, result) {
            debug!(
                condition = text,
                "plugin state changed during evaluation, result not cached"
            );
        }

        Ok(result)
    }

    /// evaluate an already parsed condition, bypassing the cache
    pub fn evaluate_condition(&self, condition: &Condition) -> Result<bool, Error> {
        let plugins = Arc::clone(&self.state.read()?.plugins);
        self.evaluate_with(condition, plugins)
    }

    /// every plugin lookup in one evaluation reads the same snapshot
    fn evaluate_with(
        &self,
        condition: &Condition,
        plugins: Arc<PluginMaps>,
    ) -> Result<bool, Error> {
        let plugins = PluginSnapshot {
            plugins,
            state: &self.state,
        };
        let ctx = EvalContext::new(self.game, &self.data_path, self.fs.as_ref(), &plugins)
            .with_additional_data_paths(&self.additional_data_paths);

        conditions::evaluate(condition, &ctx)
    }

    /// whether a result for exactly this text is cached
    pub fn is_cached(&self, text: &str) -> Result<bool, Error> {
        Ok(self.state.read()?.cache.contains(text))
    }

    /// number of cached condition results
    pub fn cache_len(&self) -> Result<usize, Error> {
        Ok(self.state.read()?.cache.len())
    }

    /// the message of the most recent failed operation on this session
    pub fn last_error_message(&self) -> Option<String> {
        self.errors.message()
    }

    pub(crate) fn errors(&self) -> &ErrorRecord {
        &self.errors
    }

    /// release the session and everything it owns
    pub fn destroy(self) {
        debug!(game = %self.game, "destroying session");
    }
}
