use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Separator between the tradable part of an instrument id and the
/// connection-specific suffix (e.g. `"ESZ5|rithmic"`).
pub const TRADABLE_ID_SEPARATOR: char = '|';

/// Descriptor attribute holding the platform's alternate instrument id.
pub const ALTERNATE_ID_ATTRIBUTE: &str = "alternate_id";

/// Whether a handle is backed by a live connection object or was rebuilt
/// from a saved descriptor and still needs resolving.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleState {
    Live,
    Placeholder,
}

/// Structural description a handle was created from.
///
/// Saved alongside strategy settings and used to resurrect placeholder
/// handles. Two descriptors are equal field-by-field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationDescriptor {
    pub id: String,
    pub name: String,
    pub connection_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CreationDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connection_id: connection_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Strip the connection-specific suffix from an instrument id.
///
/// Returns `None` when nothing tradable remains (empty id, or an id that
/// is only a suffix).
pub fn normalize_tradable_id(id: &str) -> Option<String> {
    let head = match id.split_once(TRADABLE_ID_SEPARATOR) {
        Some((head, _suffix)) => head,
        None => id,
    };
    let head = head.trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Identifies a tradable instrument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentHandle {
    pub id: String,
    pub name: String,
    pub connection_id: String,
    /// Normalized tradable id. Taken from the alternate identifier when the
    /// platform provides one, otherwise derived from `id`.
    pub tradable_id: Option<String>,
    pub descriptor: Option<CreationDescriptor>,
    pub state: HandleState,
}

impl InstrumentHandle {
    /// A live handle as pushed by the connection.
    pub fn live(
        id: impl Into<String>,
        name: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let tradable_id = normalize_tradable_id(&id);
        Self {
            id,
            name: name.into(),
            connection_id: connection_id.into(),
            tradable_id,
            descriptor: None,
            state: HandleState::Live,
        }
    }

    /// A placeholder resurrected from a saved descriptor. An
    /// [`ALTERNATE_ID_ATTRIBUTE`] on the descriptor wins over the derived
    /// tradable id, as it does for a live handle.
    pub fn placeholder(descriptor: CreationDescriptor) -> Self {
        let tradable_id = normalize_tradable_id(&descriptor.id);
        let alternate = descriptor.attributes.get(ALTERNATE_ID_ATTRIBUTE).cloned();
        let handle = Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            connection_id: descriptor.connection_id.clone(),
            tradable_id,
            descriptor: Some(descriptor),
            state: HandleState::Placeholder,
        };
        match alternate {
            Some(alt) => handle.with_alternate_id(alt),
            None => handle,
        }
    }

    /// Prefer the platform's alternate identifier over the derived one.
    /// Blank values are ignored.
    pub fn with_alternate_id(mut self, alternate: impl AsRef<str>) -> Self {
        let alt = alternate.as_ref().trim();
        if !alt.is_empty() {
            self.tradable_id = Some(alt.to_string());
        }
        self
    }

    pub fn with_descriptor(mut self, descriptor: CreationDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.state == HandleState::Placeholder
    }
}

/// Identifies a brokerage account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHandle {
    pub id: String,
    pub name: String,
    pub connection_id: String,
    pub descriptor: Option<CreationDescriptor>,
    pub state: HandleState,
}

impl AccountHandle {
    pub fn live(
        id: impl Into<String>,
        name: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            connection_id: connection_id.into(),
            descriptor: None,
            state: HandleState::Live,
        }
    }

    pub fn placeholder(descriptor: CreationDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            connection_id: descriptor.connection_id.clone(),
            descriptor: Some(descriptor),
            state: HandleState::Placeholder,
        }
    }

    pub fn with_descriptor(mut self, descriptor: CreationDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.state == HandleState::Placeholder
    }
}
