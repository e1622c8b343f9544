//! host-facing operations
//!
//! every operation returns one of the outcome codes in [`crate::codes`] instead of
//! a `Result`, and records failures so [`last_error_message`] can describe them.
//! a foreign-function layer only has to marshal arguments into these calls.

use std::path::Path;

use crate::codes;
use crate::conditions;
use crate::error::{Error, ErrorRecord};
use crate::game::GameType;
use crate::session::{Entries, Session};

thread_local! {
    // parse has no session to record into
    static PARSE_ERRORS: ErrorRecord = ErrorRecord::new();
}

fn outcome(result: Result<(), Error>) -> i32 {
    match result {
        Ok(()) => codes::OK,
        Err(e) => e.code(),
    }
}

/// create a session for the game with the given boundary id
///
/// on success the session is stored in `out`; on failure `out` is left untouched
pub fn create_session(
    out: &mut Option<Session>,
    game_id: i32,
    data_path: &Path,
    local_path: &Path,
) -> i32 {
    let result = GameType::from_id(game_id).map(|game| {
        *out = Some(Session::new(game, data_path, local_path));
    });

    if let Err(e) = &result {
        PARSE_ERRORS.with(|record| record.record(e));
    }
    outcome(result)
}

/// release a session
pub fn destroy_session(session: Session) {
    session.destroy();
}

/// check that the bytes form a valid condition
pub fn parse(text: &[u8]) -> i32 {
    let result = conditions::parse_condition_bytes(text)
        .map(|_| ())
        .map_err(Error::from);

    outcome(PARSE_ERRORS.with(|record| record.track(result)))
}

/// evaluate a condition, returning [`codes::RESULT_TRUE`], [`codes::RESULT_FALSE`]
/// or an error code
pub fn evaluate(session: &Session, text: &[u8]) -> i32 {
    let result = conditions::decode_condition_text(text)
        .map_err(Error::from)
        .and_then(|text| session.evaluate(text));

    match result {
        Ok(true) => codes::RESULT_TRUE,
        Ok(false) => codes::RESULT_FALSE,
        Err(e) => {
            // decoding failures never reached the session
            session.errors().record(&e);
            e.code()
        }
    }
}

/// replace the active plugins with `count` names
pub fn set_active_plugins<S: AsRef<str>>(
    session: &Session,
    names: Option<&[S]>,
    count: usize,
) -> i32 {
    outcome(checked(session, names, count).and_then(|e| session.set_active_plugins(e)))
}

/// replace the plugin version overrides with `count` name/version pairs
pub fn set_plugin_versions<N: AsRef<str>, V: AsRef<str>>(
    session: &Session,
    versions: Option<&[(N, V)]>,
    count: usize,
) -> i32 {
    outcome(checked(session, versions, count).and_then(|e| session.set_plugin_versions(e)))
}

/// replace the known checksums with `count` name/checksum pairs
pub fn set_crc_cache<N: AsRef<str>>(
    session: &Session,
    crcs: Option<&[(N, u32)]>,
    count: usize,
) -> i32 {
    outcome(checked(session, crcs, count).and_then(|e| session.set_crc_cache(e)))
}

fn checked<'a, T>(
    session: &Session,
    items: Option<&'a [T]>,
    count: usize,
) -> Result<Entries<'a, T>, Error> {
    Entries::checked(items, count).map_err(|e| {
        session.errors().record(&e);
        e
    })
}

/// forget every cached condition result
pub fn clear_condition_cache(session: &Session) -> i32 {
    outcome(session.clear_condition_cache())
}

/// describe the most recent failure
///
/// with a session, the most recent failure of an operation on it. without one,
/// the most recent failed [`parse`] or [`create_session`] on this thread
pub fn last_error_message(session: Option<&Session>) -> Option<String> {
    match session {
        Some(session) => session.last_error_message(),
        None => PARSE_ERRORS.with(|record| record.message()),
    }
}
