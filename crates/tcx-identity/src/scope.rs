use crate::{AccountHandle, CreationDescriptor, InstrumentHandle};

/// Looks up live handles for placeholders rebuilt from saved descriptors.
///
/// Implemented by the backend connection layer; test doubles use a map.
pub trait HandleDirectory {
    fn resolve_instrument(&self, descriptor: &CreationDescriptor) -> Option<InstrumentHandle>;
    fn resolve_account(&self, descriptor: &CreationDescriptor) -> Option<AccountHandle>;
}

/// Why a scope could not be established. Fatal at session start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeError {
    MissingInstrument,
    MissingAccount,
    /// A placeholder handle could not be resolved into a live one.
    Unresolvable { kind: &'static str, name: String },
    /// Instrument and account live on different connections.
    ConnectionMismatch {
        instrument_connection: String,
        account_connection: String,
    },
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeError::MissingInstrument => write!(f, "SCOPE_INVALID: instrument is missing"),
            ScopeError::MissingAccount => write!(f, "SCOPE_INVALID: account is missing"),
            ScopeError::Unresolvable { kind, name } => {
                write!(f, "SCOPE_INVALID: {kind} '{name}' could not be resolved")
            }
            ScopeError::ConnectionMismatch {
                instrument_connection,
                account_connection,
            } => write!(
                f,
                "SCOPE_INVALID: instrument connection '{instrument_connection}' \
                 differs from account connection '{account_connection}'"
            ),
        }
    }
}

impl std::error::Error for ScopeError {}

/// The (instrument, account) pair a session is restricted to.
///
/// Only constructible through [`ScopeKey::new`] / [`resolve_scope`], so a
/// `ScopeKey` always holds two live handles on the same connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeKey {
    instrument: InstrumentHandle,
    account: AccountHandle,
}

impl ScopeKey {
    pub fn new(instrument: InstrumentHandle, account: AccountHandle) -> Result<Self, ScopeError> {
        if instrument.is_placeholder() {
            return Err(ScopeError::Unresolvable {
                kind: "instrument",
                name: instrument.name,
            });
        }
        if account.is_placeholder() {
            return Err(ScopeError::Unresolvable {
                kind: "account",
                name: account.name,
            });
        }
        if instrument.connection_id != account.connection_id {
            return Err(ScopeError::ConnectionMismatch {
                instrument_connection: instrument.connection_id,
                account_connection: account.connection_id,
            });
        }
        Ok(Self {
            instrument,
            account,
        })
    }

    pub fn instrument(&self) -> &InstrumentHandle {
        &self.instrument
    }

    pub fn account(&self) -> &AccountHandle {
        &self.account
    }

    pub fn connection_id(&self) -> &str {
        &self.instrument.connection_id
    }

    /// `true` if the given handles fall inside this scope.
    pub fn contains(&self, instrument: &InstrumentHandle, account: &AccountHandle) -> bool {
        crate::same_instrument(Some(&self.instrument), Some(instrument))
            && crate::same_account(Some(&self.account), Some(account))
    }
}

/// Resolve placeholders through `directory`, then validate the pair.
pub fn resolve_scope(
    instrument: Option<InstrumentHandle>,
    account: Option<AccountHandle>,
    directory: &dyn HandleDirectory,
) -> Result<ScopeKey, ScopeError> {
    let instrument = instrument.ok_or(ScopeError::MissingInstrument)?;
    let account = account.ok_or(ScopeError::MissingAccount)?;

    let instrument = if instrument.is_placeholder() {
        instrument
            .descriptor
            .as_ref()
            .and_then(|d| directory.resolve_instrument(d))
            .ok_or_else(|| ScopeError::Unresolvable {
                kind: "instrument",
                name: instrument.name.clone(),
            })?
    } else {
        instrument
    };

    let account = if account.is_placeholder() {
        account
            .descriptor
            .as_ref()
            .and_then(|d| directory.resolve_account(d))
            .ok_or_else(|| ScopeError::Unresolvable {
                kind: "account",
                name: account.name.clone(),
            })?
    } else {
        account
    };

    ScopeKey::new(instrument, account)
}
