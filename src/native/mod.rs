//! Native Object Cache
//!
//! Every logical object (buffer, texture, bind group, pipeline, pass bundle)
//! owns a [`NativeCache`] holding the device handle that backs it. The handle
//! is produced lazily: [`NativeCache::read`] is the only way to obtain it, and
//! it consults the pending [`Invalidation`] reasons to decide between
//!
//! 1. returning the cached handle untouched (no reasons pending),
//! 2. patching the handle in place ([`NativeOps::update`] reports success),
//! 3. regenerating it, by default destroying the old handle and generating
//!    a new one ([`NativeOps::regenerate`]).
//!
//! ```text
//!  invalidate(reason) ──► reasons |= reason
//!                                │
//!  read() ── reasons empty? ── yes ──► cached handle
//!               │ no
//!               ▼
//!        update(handle) ── ok ──► clear reasons, cached handle
//!               │ cannot
//!               ▼
//!        regenerate ──► clear reasons, new handle
//! ```
//!
//! The cache is kind-agnostic; per-kind behaviour lives in [`NativeOps`].

pub mod listeners;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

pub use listeners::{Listener, ListenerSet, ResourceKey};

bitflags! {
    /// Why a native handle is stale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Invalidation: u32 {
        /// Generic descriptor change (label, sampler state, ...).
        const PROPERTIES      = 1 << 0;
        const SIZE            = 1 << 1;
        const FORMAT          = 1 << 2;
        const USAGE           = 1 << 3;
        /// Data change of unchanged size; buffers apply it in place.
        const CONTENTS        = 1 << 4;
        /// A bound resource changed.
        const BINDINGS        = 1 << 5;
        const LAYOUT          = 1 << 6;
        const PIPELINE        = 1 << 7;
        const RENDER_TARGET   = 1 << 8;
        /// Pass steps were added or removed.
        const INSTRUCTIONS    = 1 << 9;
        /// A per-frame object reached the end of its frame.
        const LIFETIME_REACHED = 1 << 10;
        const DECONSTRUCTED   = 1 << 11;
    }
}

/// How long a native handle stays valid without explicit invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lifetime {
    /// Valid until invalidated.
    #[default]
    Persistent,
    /// Invalidated with [`Invalidation::LIFETIME_REACHED`] on every frame tick.
    PerFrame,
}

/// Per-kind native handle operations.
pub trait NativeOps<H> {
    /// Creates a fresh handle. `Ok(None)` means nothing could be produced.
    fn generate(&mut self) -> Result<Option<H>>;

    /// Tries to bring `handle` up to date in place.
    ///
    /// Returns `Ok(false)` when the reasons require re-creation.
    fn update(&mut self, _handle: H, _reasons: Invalidation) -> Result<bool> {
        Ok(false)
    }

    fn destroy(&mut self, handle: H);

    /// Replaces a stale `handle` that [`update`](Self::update) declined.
    ///
    /// Kinds whose native object holds data override this to carry it over
    /// before the old handle goes away.
    fn regenerate(&mut self, handle: H, _reasons: Invalidation) -> Result<Option<H>> {
        self.destroy(handle);
        self.generate()
    }
}

/// Lazily created native handle plus its pending invalidation reasons.
#[derive(Debug, Clone)]
pub struct NativeCache<H> {
    label: String,
    native: Option<H>,
    reasons: Invalidation,
    lifetime: Lifetime,
    is_setup: bool,
    deconstructed: bool,
    generations: u64,
}

impl<H: Copy> NativeCache<H> {
    pub fn new(label: impl Into<String>, lifetime: Lifetime) -> Self {
        Self {
            label: label.into(),
            native: None,
            reasons: Invalidation::empty(),
            lifetime,
            is_setup: false,
            deconstructed: false,
            generations: 0,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The current handle without refreshing it.
    #[must_use]
    pub fn peek(&self) -> Option<H> {
        self.native
    }

    #[must_use]
    pub fn reasons(&self) -> Invalidation {
        self.reasons
    }

    /// True once a handle has been generated at least once.
    #[must_use]
    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    #[must_use]
    pub fn is_deconstructed(&self) -> bool {
        self.deconstructed
    }

    /// Number of times a handle was generated from scratch.
    #[must_use]
    pub fn generations(&self) -> u64 {
        self.generations
    }

    /// Whether the next [`read`](Self::read) will touch the device.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        !self.deconstructed && (self.native.is_none() || !self.reasons.is_empty())
    }

    /// Records `reason` and returns the bits that were not pending before.
    ///
    /// A deconstructed cache ignores further invalidation.
    pub fn invalidate(&mut self, reason: Invalidation) -> Invalidation {
        if self.deconstructed {
            return Invalidation::empty();
        }
        let added = reason - self.reasons;
        self.reasons |= reason;
        added
    }

    /// Returns an up-to-date handle, updating or regenerating it as needed.
    pub fn read(&mut self, ops: &mut impl NativeOps<H>) -> Result<H> {
        if self.deconstructed {
            return Err(Error::UseAfterDeconstruct(self.label.clone()));
        }

        if let Some(handle) = self.native {
            if self.reasons.is_empty() {
                return Ok(handle);
            }
            if ops.update(handle, self.reasons)? {
                log::trace!("Updated native '{}' in place ({:?})", self.label, self.reasons);
                self.reasons = Invalidation::empty();
                return Ok(handle);
            }
            log::debug!("Recreating native '{}' ({:?})", self.label, self.reasons);
            self.native = None;
            let handle = ops
                .regenerate(handle, self.reasons)?
                .ok_or_else(|| Error::NoNativeObject(self.label.clone()))?;
            return Ok(self.install(handle));
        }

        let handle = ops
            .generate()?
            .ok_or_else(|| Error::NoNativeObject(self.label.clone()))?;
        if self.generations == 0 {
            log::debug!("Generated native '{}'", self.label);
        }
        Ok(self.install(handle))
    }

    fn install(&mut self, handle: H) -> H {
        self.native = Some(handle);
        self.reasons = Invalidation::empty();
        self.is_setup = true;
        self.generations += 1;
        handle
    }

    /// Destroys the handle and blocks every further read.
    pub fn deconstruct(&mut self, ops: &mut impl NativeOps<H>) {
        if self.deconstructed {
            return;
        }
        if let Some(handle) = self.native.take() {
            ops.destroy(handle);
        }
        log::debug!("Deconstructed '{}'", self.label);
        self.reasons = Invalidation::DECONSTRUCTED;
        self.deconstructed = true;
    }
}
