//! `cohort-core` — foundational types for the `cohort` simulation framework.
//!
//! This crate is a dependency of every other `cohort-*` crate.  It has no
//! `cohort-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `Uid` — permanent agent identifier                    |
//! | [`time`]        | `Step`, `SimClock`, `SimConfig`                       |
//! | [`rng`]         | seed mixing, `StreamRng` (one keyed substream)        |
//! | [`count`]       | `IntoCount` — checked conversion of draw/alloc counts |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |
//!           | Required for simulation snapshots.                         |

pub mod count;
pub mod error;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use count::IntoCount;
pub use error::{CoreError, CoreResult};
pub use ids::Uid;
pub use rng::{MIXING_CONSTANT, StreamRng, mix_seed, splitmix64};
pub use time::{SimClock, SimConfig, Step};
