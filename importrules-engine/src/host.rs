//! Narrow interfaces through which the engine talks to its host.
//!
//! The host owns the created objects, their properties and their metadata
//! tags. The engine only ever sees them through [`ImportedAsset`], and only
//! ever receives work through [`ImportListener`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::property::PropertyMap;

/// Type identifier under which rules are registered.
///
/// Matching is an "is-a" test against the object's class chain, so a rule
/// registered for `Texture` also sees every `Texture2D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an object with the given class chain is a member of this category.
    pub fn admits(&self, class_chain: &[String]) -> bool {
        class_chain.iter().any(|class| class == &self.0)
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Category::new(value)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::new(value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance delivered alongside an import event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportContext {
    /// Name of the factory that produced the object.
    pub factory: String,
    /// Source file reported by the factory. Used only when the object carries
    /// no import data of its own.
    #[serde(default)]
    pub source_file: Option<String>,
}

impl ImportContext {
    pub fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            source_file: None,
        }
    }

    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }
}

/// A host object that was just created or re-imported.
pub trait ImportedAsset {
    /// Identity used in logs and error reports.
    fn full_name(&self) -> String;

    /// Runtime class followed by its supertypes, most-derived first.
    fn class_chain(&self) -> &[String];

    /// Original file the object was imported from, when it records one.
    fn source_file(&self) -> Option<String>;

    /// Fully-qualified location of the object inside the host.
    fn destination_path(&self) -> String;

    /// Applies every property in one host call; either all land or the call fails.
    fn set_properties(&mut self, properties: &PropertyMap) -> Result<(), HostError>;

    /// Reads a metadata tag. A tag that was never set reads as `None`.
    fn metadata_tag(&self, key: &str) -> Option<String>;

    fn set_metadata_tag(&mut self, key: &str, value: &str) -> Result<(), HostError>;
}

/// Receiver of the host's "object created" notifications.
pub trait ImportListener: Send + Sync {
    /// `asset` is `None` when the host's creation step failed.
    fn on_object_created(&self, ctx: &ImportContext, asset: Option<&mut dyn ImportedAsset>);
}

/// Token identifying one listener registration on an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Host event source that listeners subscribe to.
pub trait ImportEvents {
    fn subscribe(&self, listener: Arc<dyn ImportListener>) -> SubscriptionId;

    /// Returns `false` when the id was not (or no longer) subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Handle returned by an explicit subscription; detach it on shutdown.
#[derive(Debug)]
#[must_use = "dropping the subscription leaves the listener attached until detached"]
pub struct Subscription {
    id: SubscriptionId,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn detach(self, events: &dyn ImportEvents) -> bool {
        events.unsubscribe(self.id)
    }
}
