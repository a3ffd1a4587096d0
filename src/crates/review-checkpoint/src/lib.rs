//! Session persistence for the review engine.
//!
//! A session is the durable form of a review task: task metadata plus the
//! serialized graph checkpoint. This crate defines the [`Checkpointer`]
//! trait that the graph runner writes through, an in-memory reference
//! implementation, and the size guard that keeps persisted graph state
//! within bounds. Production backends (e.g. the sqlite store in the server
//! crate) implement the same trait.

pub mod error;
pub mod guard;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{CheckpointError, Result};
pub use guard::{bound_graph_state, unbound_graph_state, MAX_STATE_BYTES};
pub use memory::MemorySessionStore;
pub use record::SessionRecord;
pub use traits::Checkpointer;
