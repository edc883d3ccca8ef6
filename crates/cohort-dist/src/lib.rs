//! `cohort-dist` — structurally seeded random streams.
//!
//! Every random draw in a simulation comes from a [`Distribution`] bound to a
//! [`StreamIdentity`]: the path from the simulation root to the place the
//! distribution is declared.  The identity alone (plus the run's root seed)
//! fixes the stream, so two scenarios that differ in one module still see
//! identical values from every other draw site.  This is what makes
//! scenario-vs-baseline comparisons low-variance.
//!
//! # Crate layout
//!
//! | Module           | Contents                                              |
//! |------------------|-------------------------------------------------------|
//! | [`identity`]     | `PathStep`, `PathIndex`, `StreamPath`, `StreamIdentity` |
//! | [`family`]       | `Family`, `ChoiceTable`, `ExternalSampler`, lognormal moments |
//! | [`param`]        | `Param`, `DrawContext`                                |
//! | [`distribution`] | `Distribution`, `StreamState`                         |
//! | [`clock`]        | `StepClock` (shared step index)                       |
//! | [`registry`]     | `StreamRegistry`, `RegistryEntry`                     |
//! | [`error`]        | `DistError`, `DistResult<T>`                          |
//!
//! # Feature flags
//!
//! | Flag      | Effect                                                   |
//! |-----------|----------------------------------------------------------|
//! | `serde`   | Derives `Serialize`/`Deserialize` on identities and `StreamState`. |
//! | `fx-hash` | FxHash for the registry table.                           |

pub mod clock;
pub mod distribution;
pub mod error;
pub mod family;
pub mod identity;
pub mod param;
pub mod registry;


pub use clock::StepClock;
pub use distribution::{Distribution, MAX_DRAW, StreamState};
pub use error::{DistError, DistResult};
pub use family::{ChoiceTable, ExternalSampler, Family, lognormal_underlying};
pub use identity::{PathIndex, PathStep, StreamIdentity, StreamPath};
pub use param::{DrawContext, Param, ParamFn};
pub use registry::{RegistryEntry, StreamRegistry};
