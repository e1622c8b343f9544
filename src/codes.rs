//! outcome codes returned by the boundary operations
//!
//! non-negative codes are successful outcomes, negative codes are errors.
//! hosts rely on these values, so they must never change

/// operation completed successfully
pub const OK: i32 = 0;

/// condition evaluated to false
pub const RESULT_FALSE: i32 = 0;

/// condition evaluated to true
pub const RESULT_TRUE: i32 = 1;

/// invalid arguments were given, e.g. a collection whose declared size disagrees
/// with its contents
pub const ERROR_INVALID_ARGS: i32 = -1;

/// the condition expression could not be parsed
pub const ERROR_PARSING_ERROR: i32 = -2;

/// the version fields of an executable could not be read
pub const ERROR_PE_PARSING_ERROR: i32 = -3;

/// some sort of I/O error occurred
pub const ERROR_IO_ERROR: i32 = -4;

/// a session lock was poisoned by a panicking thread
pub const ERROR_POISONED_THREAD_LOCK: i32 = -6;
