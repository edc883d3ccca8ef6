//! Structural paths and the stream identities derived from them.
//!
//! A draw site is located by the chain of containers from the simulation root
//! down to the distribution:
//!
//! ```text
//! diseases . sir . pars . dur_inf          → StreamPath of 4 named steps
//! networks . layers[1] . dur               → the middle step carries Index(1)
//! diseases . hiv . beta["maternal"]        → Key("maternal")
//! ```
//!
//! # Canonical encoding
//!
//! The key is the first 64 bits of a BLAKE3 hash over a length-prefixed,
//! type-tagged encoding of the steps.  Consequences:
//!
//! - the key depends on this path only, never on walk order or on any other
//!   distribution in the tree;
//! - `a.b` and `ab` differ (length prefixes), as do `x[0]` and `x["0"]`
//!   (list indices and mapping keys are tagged separately);
//! - the optional salt is hashed after the steps, so a salted identity never
//!   equals the unsalted one.

use std::fmt;

use cohort_core::mix_seed;

/// Domain separator mixed into every path hash.
const PATH_DOMAIN: &[u8] = b"cohort.stream-path.v1";

const TAG_NONE: u8 = 0;
const TAG_INDEX: u8 = 1;
const TAG_KEY: u8 = 2;

/// The optional subscript on a path step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathIndex {
    /// Position in a list-like container.
    Index(u64),
    /// Key in a mapping-like container.
    Key(String),
}

/// One `(name, optional index)` step of a structural path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathStep {
    pub name:  String,
    pub index: Option<PathIndex>,
}

impl PathStep {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), index: None }
    }

    pub fn indexed(name: impl Into<String>, index: u64) -> Self {
        Self { name: name.into(), index: Some(PathIndex::Index(index)) }
    }

    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self { name: name.into(), index: Some(PathIndex::Key(key.into())) }
    }

    fn encode(&self, hasher: &mut blake3::Hasher) {
        encode_str(hasher, &self.name);
        match &self.index {
            None => {
                hasher.update(&[TAG_NONE]);
            }
            Some(PathIndex::Index(i)) => {
                hasher.update(&[TAG_INDEX]);
                hasher.update(&i.to_le_bytes());
            }
            Some(PathIndex::Key(k)) => {
                hasher.update(&[TAG_KEY]);
                encode_str(hasher, k);
            }
        }
    }
}

impl From<&str> for PathStep {
    fn from(name: &str) -> Self {
        PathStep::named(name)
    }
}

impl From<String> for PathStep {
    fn from(name: String) -> Self {
        PathStep::named(name)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            None => write!(f, "{}", self.name),
            Some(PathIndex::Index(i)) => write!(f, "{}[{}]", self.name, i),
            Some(PathIndex::Key(k)) => write!(f, "{}[{:?}]", self.name, k),
        }
    }
}

fn encode_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

// ── StreamPath ────────────────────────────────────────────────────────────────

/// Ordered steps from the simulation root to a draw site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamPath {
    steps: Vec<PathStep>,
}

impl StreamPath {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self::default()
    }

    /// A path of named steps: `StreamPath::of(["diseases", "sir", "dur_inf"])`.
    pub fn of<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathStep>,
    {
        Self { steps: steps.into_iter().map(Into::into).collect() }
    }

    /// This path extended by one step.
    pub fn child(mut self, step: impl Into<PathStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// `self` followed by every step of `tail`.
    pub fn join(mut self, tail: &StreamPath) -> Self {
        self.steps.extend(tail.steps.iter().cloned());
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn encode(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.steps.len() as u64).to_le_bytes());
        for step in &self.steps {
            step.encode(hasher);
        }
    }
}

impl fmt::Display for StreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

// ── StreamIdentity ────────────────────────────────────────────────────────────

/// Immutable identity of one draw site: a path, an optional salt, and the
/// 64-bit key hashed from both.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamIdentity {
    path: StreamPath,
    salt: Option<u64>,
    key:  u64,
}

impl StreamIdentity {
    pub fn new(path: StreamPath) -> Self {
        Self::build(path, None)
    }

    /// An identity with an explicit salt, for callers that need several
    /// independent streams at one structural site.
    pub fn with_salt(path: StreamPath, salt: u64) -> Self {
        Self::build(path, Some(salt))
    }

    fn build(path: StreamPath, salt: Option<u64>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(PATH_DOMAIN);
        path.encode(&mut hasher);
        match salt {
            None => {
                hasher.update(&[TAG_NONE]);
            }
            Some(s) => {
                hasher.update(&[TAG_INDEX]);
                hasher.update(&s.to_le_bytes());
            }
        }
        let b = hasher.finalize();
        let b = b.as_bytes();
        let key = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        Self { path, salt, key }
    }

    pub fn path(&self) -> &StreamPath {
        &self.path
    }

    pub fn salt(&self) -> Option<u64> {
        self.salt
    }

    /// The 64-bit structural key.  Independent of the root seed.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The stream seed for this site under `root_seed`.
    #[inline]
    pub fn stream_seed(&self, root_seed: u64) -> u64 {
        mix_seed(root_seed, &[self.key])
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.salt {
            None => write!(f, "{}", self.path),
            Some(s) => write!(f, "{}#{}", self.path, s),
        }
    }
}
