// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed identifiers.
//!
//! An [`Id<T>`] is a v4 [`Uuid`] tagged at compile time with the type it identifies, so that the
//! id of a chain stage can not be handed where the id of a proxy instance is expected.
//!
//! ```rust,compile_fail
//! # use forwarder_id::Id;
//! # struct Stage;
//! # struct Proxy;
//! fn mixup(mut stage: Id<Stage>, proxy: Id<Proxy>) {
//!     stage = proxy;
//! }
//! ```

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use uuid::Uuid;

/// A [`Uuid`] tagged with the type `T` it identifies.
#[repr(transparent)]
pub struct Id<T: ?Sized>(Uuid, PhantomData<fn() -> T>);

impl<T: ?Sized> Id<T> {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4(), PhantomData)
    }

    /// Tag an existing [`Uuid`].
    #[must_use]
    pub const fn from_raw(raw: Uuid) -> Self {
        Self(raw, PhantomData)
    }

    /// A well-known id, for things looked up by an id fixed at build time.
    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self::from_raw(Uuid::from_u128(raw))
    }

    /// The untyped value of this id.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl<T: ?Sized> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Id<T> {}

impl<T: ?Sized> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: ?Sized> Eq for Id<T> {}

impl<T: ?Sized> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T: ?Sized> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T: ?Sized> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T: ?Sized> Debug for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl<T: ?Sized> From<Uuid> for Id<T> {
    fn from(raw: Uuid) -> Self {
        Self::from_raw(raw)
    }
}
