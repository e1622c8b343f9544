// library crate for condition-interpreter
// parses and evaluates the condition expressions used by plugin load-order rules

pub mod boundary;
pub mod cache;
pub mod codes;
pub mod conditions;
pub mod config;
pub mod error;
pub mod executable;
pub mod fs;
pub mod game;
pub mod plugin;
pub mod session;

pub use conditions::{parse_condition, Condition, ParseError};
pub use error::Error;
pub use game::GameType;
pub use session::{Entries, Session};
