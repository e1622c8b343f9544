//! supported game titles

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// games whose plugin data can be queried by conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    Oblivion,
    Skyrim,
    SkyrimSE,
    SkyrimVR,
    Fallout3,
    FalloutNV,
    Fallout4,
    Fallout4VR,
    Morrowind,
    Starfield,
}

impl GameType {
    /// every supported game, in boundary id order
    pub const ALL: [GameType; 10] = [
        GameType::Oblivion,
        GameType::Skyrim,
        GameType::SkyrimSE,
        GameType::SkyrimVR,
        GameType::Fallout3,
        GameType::FalloutNV,
        GameType::Fallout4,
        GameType::Fallout4VR,
        GameType::Morrowind,
        GameType::Starfield,
    ];

    /// look up a game by its boundary id
    pub fn from_id(id: i32) -> Result<Self, Error> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| Error::InvalidArgument(format!("invalid game id: {}", id)))
    }

    /// the stable id used at the host boundary
    pub fn id(self) -> i32 {
        match self {
            GameType::Oblivion => 0,
            GameType::Skyrim => 1,
            GameType::SkyrimSE => 2,
            GameType::SkyrimVR => 3,
            GameType::Fallout3 => 4,
            GameType::FalloutNV => 5,
            GameType::Fallout4 => 6,
            GameType::Fallout4VR => 7,
            GameType::Morrowind => 8,
            GameType::Starfield => 9,
        }
    }

    /// whether `.esl` files are plugins for this game
    pub fn supports_light_plugins(self) -> bool {
        matches!(
            self,
            GameType::SkyrimSE
                | GameType::SkyrimVR
                | GameType::Fallout4
                | GameType::Fallout4VR
                | GameType::Starfield
        )
    }

    /// size in bytes of a record header in this game's plugin format
    pub(crate) fn record_header_size(self) -> usize {
        match self {
            GameType::Morrowind => 16,
            GameType::Oblivion => 20,
            _ => 24,
        }
    }

    /// check whether a path names a plugin file, ignoring any `.ghost` suffix
    pub fn is_plugin_path(self, path: &Path) -> bool {
        let path = match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("ghost") => match path.file_stem() {
                Some(stem) => Path::new(stem),
                None => return false,
            },
            _ => path,
        };

        self.is_unghosted_plugin_path(path)
    }

    /// check whether a path has a plugin extension (no `.ghost` suffix)
    pub fn is_unghosted_plugin_path(self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                ext.eq_ignore_ascii_case("esp")
                    || ext.eq_ignore_ascii_case("esm")
                    || (self.supports_light_plugins() && ext.eq_ignore_ascii_case("esl"))
            }
            None => false,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameType::Oblivion => "The Elder Scrolls IV: Oblivion",
            GameType::Skyrim => "The Elder Scrolls V: Skyrim",
            GameType::SkyrimSE => "The Elder Scrolls V: Skyrim Special Edition",
            GameType::SkyrimVR => "The Elder Scrolls V: Skyrim VR",
            GameType::Fallout3 => "Fallout 3",
            GameType::FalloutNV => "Fallout: New Vegas",
            GameType::Fallout4 => "Fallout 4",
            GameType::Fallout4VR => "Fallout 4 VR",
            GameType::Morrowind => "The Elder Scrolls III: Morrowind",
            GameType::Starfield => "Starfield",
        };
        write!(f, "{}", name)
    }
}
