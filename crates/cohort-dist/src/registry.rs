//! `StreamRegistry` — per-simulation table of bound draw sites.
//!
//! The registry owns the root seed and the [`StepClock`] and records one
//! entry per structural identity.  It never owns distributions: those stay
//! inside the modules that declare them, and the registry keeps only what is
//! needed to detect duplicate identities and to audit which streams exist.

use tracing::{debug, info};

use crate::{DistError, DistResult, Distribution, StepClock, StreamIdentity};

#[cfg(feature = "fx-hash")]
type KeyMap<V> = rustc_hash::FxHashMap<u64, V>;
#[cfg(not(feature = "fx-hash"))]
type KeyMap<V> = std::collections::HashMap<u64, V>;

/// One registered stream.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryEntry {
    pub identity: StreamIdentity,
    /// Label of the distribution bound to this identity.
    pub label:    String,
    /// Family name (`"normal"`, `"bernoulli"`, …).
    pub family:   &'static str,
    pub seed:     u64,
}

#[derive(Debug)]
pub struct StreamRegistry {
    root_seed: u64,
    clock:     StepClock,
    entries:   KeyMap<RegistryEntry>,
    /// Keys in registration order.
    order:     Vec<u64>,
}

impl StreamRegistry {
    pub fn new(root_seed: u64) -> Self {
        Self {
            root_seed,
            clock: StepClock::new(),
            entries: KeyMap::default(),
            order: Vec::new(),
        }
    }

    pub fn root_seed(&self) -> u64 {
        self.root_seed
    }

    /// A handle to the shared step clock.
    pub fn clock(&self) -> StepClock {
        self.clock.clone()
    }

    pub fn step(&self) -> u64 {
        self.clock.get()
    }

    /// Move the shared clock to `step`.  Every bound distribution resets its
    /// counters on its next draw.
    pub fn advance_to(&self, step: u64) {
        self.clock.set(step);
    }

    /// Bind `dist` to `identity` and record it.
    ///
    /// Fails with [`DistError::DuplicateStreamIdentity`] if the identity is
    /// already taken, and with [`DistError::AlreadyBound`] if `dist` is bound
    /// elsewhere.  On success the distribution's counters are cleared and the
    /// stream seed is returned.
    pub fn register(&mut self, identity: StreamIdentity, dist: &mut Distribution) -> DistResult<u64> {
        let key = identity.key();
        if let Some(existing) = self.entries.get(&key) {
            return Err(DistError::DuplicateStreamIdentity {
                path:     identity.to_string(),
                existing: existing.label.clone(),
                incoming: dist.label().to_owned(),
            });
        }
        dist.bind(identity.clone(), self.root_seed, self.clock.clone())?;
        dist.reset();
        let seed = identity.stream_seed(self.root_seed);
        debug!(path = %identity, dist = %dist.label(), "registered stream");
        self.entries.insert(key, RegistryEntry {
            identity,
            label: dist.label().to_owned(),
            family: dist.family().name(),
            seed,
        });
        self.order.push(key);
        Ok(seed)
    }

    /// Every registered entry, in registration order.
    pub fn all(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn get(&self, identity: &StreamIdentity) -> Option<&RegistryEntry> {
        self.entries
            .get(&identity.key())
            .filter(|e| e.identity == *identity)
    }

    pub fn contains(&self, identity: &StreamIdentity) -> bool {
        self.get(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry and rewind the clock to step 0.  The root seed is
    /// kept, so re-registering the same tree reproduces the same streams.
    pub fn reset(&mut self) {
        info!(streams = self.entries.len(), "resetting stream registry");
        self.entries.clear();
        self.order.clear();
        self.clock.set(0);
    }
}
