//! condition result cache

use std::collections::HashMap;

/// evaluation results keyed by the exact expression text
///
/// every clear starts a new generation. an evaluation notes the generation it
/// started in and its result is only stored if no clear happened meanwhile,
/// so a result computed against replaced state never lands in the cache
#[derive(Debug, Default)]
pub struct ConditionCache {
    generation: u64,
    results: HashMap<String, bool>,
}

impl ConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// a cached result; the text is not normalised
    pub fn get(&self, text: &str) -> Option<bool> {
        self.results.get(text).copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// store a result computed during `generation`
    ///
    /// returns false, storing nothing, if the cache was cleared since
    pub fn insert(&mut self, generation: u64, text: &str, result: bool) -> bool {
        if generation != self.generation {
            return false;
        }
        self.results.insert(text.to_string(), result);
        true
    }

    /// drop every result and start a new generation
    pub fn clear(&mut self) {
        self.results.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn contains(&self, text: &str) -> bool {
        self.results.contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
