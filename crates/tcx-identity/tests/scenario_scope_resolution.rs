//! Scenario: scope resolution at session start.
//!
//! Placeholders are resolved through the directory; a scope is only valid
//! when both handles are live and share one connection.

use std::collections::BTreeMap;

use tcx_identity::*;

#[derive(Default)]
struct MapDirectory {
    instruments: BTreeMap<String, InstrumentHandle>,
    accounts: BTreeMap<String, AccountHandle>,
}

impl HandleDirectory for MapDirectory {
    fn resolve_instrument(&self, d: &CreationDescriptor) -> Option<InstrumentHandle> {
        self.instruments.get(&d.name).cloned()
    }

    fn resolve_account(&self, d: &CreationDescriptor) -> Option<AccountHandle> {
        self.accounts.get(&d.name).cloned()
    }
}

fn directory() -> MapDirectory {
    let mut dir = MapDirectory::default();
    dir.instruments.insert(
        "ESZ5".to_string(),
        InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim"),
    );
    dir.accounts
        .insert("Sim101".to_string(), AccountHandle::live("acc-1", "Sim101", "sim"));
    dir.accounts
        .insert("Live7".to_string(), AccountHandle::live("acc-7", "Live7", "live"));
    dir
}

#[test]
fn placeholders_resolve_into_live_scope() {
    let dir = directory();
    let scope = resolve_scope(
        Some(InstrumentHandle::placeholder(CreationDescriptor::new("old", "ESZ5", "sim"))),
        Some(AccountHandle::placeholder(CreationDescriptor::new("old", "Sim101", "sim"))),
        &dir,
    )
    .unwrap();

    assert_eq!(scope.instrument().id, "ESZ5|sim");
    assert_eq!(scope.account().id, "acc-1");
    assert_eq!(scope.connection_id(), "sim");
}

#[test]
fn missing_handles_are_rejected() {
    let dir = directory();
    let acc = AccountHandle::live("acc-1", "Sim101", "sim");
    let ins = InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim");

    assert_eq!(
        resolve_scope(None, Some(acc), &dir).unwrap_err(),
        ScopeError::MissingInstrument
    );
    assert_eq!(
        resolve_scope(Some(ins), None, &dir).unwrap_err(),
        ScopeError::MissingAccount
    );
}

#[test]
fn unknown_placeholder_is_unresolvable() {
    let dir = directory();
    let err = resolve_scope(
        Some(InstrumentHandle::placeholder(CreationDescriptor::new("x", "CLZ5", "sim"))),
        Some(AccountHandle::live("acc-1", "Sim101", "sim")),
        &dir,
    )
    .unwrap_err();
    assert!(matches!(err, ScopeError::Unresolvable { kind: "instrument", .. }));
    assert!(err.to_string().starts_with("SCOPE_INVALID"));
}

#[test]
fn cross_connection_scope_is_invalid() {
    let dir = directory();
    let err = resolve_scope(
        Some(InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim")),
        Some(AccountHandle::placeholder(CreationDescriptor::new("x", "Live7", "live"))),
        &dir,
    )
    .unwrap_err();
    assert_eq!(
        err,
        ScopeError::ConnectionMismatch {
            instrument_connection: "sim".to_string(),
            account_connection: "live".to_string(),
        }
    );
}

#[test]
fn scope_contains_uses_identity_matcher() {
    let scope = ScopeKey::new(
        InstrumentHandle::live("ESZ5|sim", "ESZ5", "sim"),
        AccountHandle::live("acc-1", "Sim101", "sim"),
    )
    .unwrap();

    let ins_other_repr = InstrumentHandle::live("ESZ5|sim-feed", "E-mini", "sim");
    let acc_same = AccountHandle::live("acc-1", "renamed", "sim");
    let acc_other = AccountHandle::live("acc-2", "Sim102", "sim");

    assert!(scope.contains(&ins_other_repr, &acc_same));
    assert!(!scope.contains(&ins_other_repr, &acc_other));
}
