//! Unique identifier (UID) syntax and generation

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::domain::error::{ContentError, ContentResult};

/// Maximum length of a UID.
pub const MAX_UID_LENGTH: usize = 64;

/// Root for UUID-derived UIDs.
pub const UUID_UID_ROOT: &str = "2.25";

/// Decimal digits of the largest 128-bit UUID.
pub const UUID_DECIMAL_DIGITS: usize = 39;

/// Longest root that [`generate_uid`] can always extend.
pub const MAX_GENERATED_UID_ROOT_LENGTH: usize = MAX_UID_LENGTH - 1 - UUID_DECIMAL_DIGITS;

fn uid_regex() -> &'static Regex {
    static UID: OnceLock<Regex> = OnceLock::new();
    // components are numbers without leading zeros, separated by dots
    UID.get_or_init(|| Regex::new(r"^(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))*$").unwrap())
}

pub fn is_valid_uid(uid: &str) -> bool {
    uid.len() <= MAX_UID_LENGTH && uid_regex().is_match(uid)
}

pub fn check_uid(uid: &str) -> ContentResult<()> {
    if is_valid_uid(uid) {
        Ok(())
    } else {
        Err(ContentError::InvalidValue {
            what: "UID",
            reason: format!("'{}' is not a valid UID", uid),
        })
    }
}

/// Generates a UID below `root` from a random UUID.
///
/// The UUID is appended as its decimal integer value, e.g.
/// `2.25.329800735698586629295641978511506172918`.
pub fn generate_uid(root: &str) -> ContentResult<String> {
    check_uid(root)?;
    let uid = format!("{}.{}", root, Uuid::new_v4().as_u128());
    check_uid(&uid)?;
    Ok(uid)
}
