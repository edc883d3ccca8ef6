//! `cohort-agent` — UID-keyed agent storage for the `cohort` framework.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`allocator`]   | `UidAllocator` — monotonic UIDs and the alive bitmap        |
//! | [`array`]       | `UidArray<T>` (dense, UID-addressed), `UidView` (read-only) |
//! | [`state`]       | `StateColumn` trait, `StateMap`                            |
//! | [`people`]      | `People` — allocator plus every per-agent column           |
//! | [`builder`]     | `PeopleBuilder` (fluent construction)                      |
//! | [`snapshot`]    | `PopulationSnapshot` — resumable copy of a `People`        |
//! | [`error`]       | `AgentError`, `AgentResult<T>`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                      |
//! |---------|-------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on the allocator, arrays, and population snapshots. |

pub mod allocator;
pub mod array;
pub mod builder;
pub mod error;
pub mod people;
pub mod snapshot;
pub mod state;


pub use allocator::UidAllocator;
pub use array::{UidArray, UidView};
pub use builder::PeopleBuilder;
pub use error::{AgentError, AgentResult};
pub use people::People;
pub use snapshot::PopulationSnapshot;
pub use state::{State, StateColumn, StateMap};
