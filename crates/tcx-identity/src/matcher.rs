//! Identity matcher.
//!
//! Position, order and trade events arrive from independent streams and
//! may carry the same instrument/account in different representations
//! (live vs placeholder, platform-normalized ids, stale names). Matching is
//! therefore a disjunction of several weaker checks:
//!
//! - instrument: id | (name, connection) | descriptor | (tradable id, connection)
//! - account:    id | (name, connection) | descriptor
//!
//! A missing handle never matches. A handle always matches itself (field
//! by field equal). Otherwise blank fields never match each other.

use crate::{AccountHandle, InstrumentHandle};

fn eq_non_blank(a: &str, b: &str) -> bool {
    !a.is_empty() && a == b
}

fn eq_pair(a: (&str, &str), b: (&str, &str)) -> bool {
    eq_non_blank(a.0, b.0) && eq_non_blank(a.1, b.1)
}

/// `true` if both handles denote the same instrument.
///
/// Total, commutative and reflexive for any present handle.
pub fn same_instrument(a: Option<&InstrumentHandle>, b: Option<&InstrumentHandle>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if a == b {
        return true;
    }

    if eq_non_blank(&a.id, &b.id) {
        return true;
    }
    if eq_pair((&a.name, &a.connection_id), (&b.name, &b.connection_id)) {
        return true;
    }
    if let (Some(da), Some(db)) = (&a.descriptor, &b.descriptor) {
        if da == db {
            return true;
        }
    }
    match (&a.tradable_id, &b.tradable_id) {
        (Some(ta), Some(tb)) => eq_pair((ta, &a.connection_id), (tb, &b.connection_id)),
        _ => false,
    }
}

/// `true` if both handles denote the same account.
pub fn same_account(a: Option<&AccountHandle>, b: Option<&AccountHandle>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if a == b {
        return true;
    }

    if eq_non_blank(&a.id, &b.id) {
        return true;
    }
    if eq_pair((&a.name, &a.connection_id), (&b.name, &b.connection_id)) {
        return true;
    }
    matches!((&a.descriptor, &b.descriptor), (Some(da), Some(db)) if da == db)
}
