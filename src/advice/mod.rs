//! Advice-with: structural rewriting of route definitions.
//!
//! The matcher finds nodes by id, endpoint uri, to-string pattern or type;
//! weave edits insert before/after, replace or remove them. Edits run on a
//! working copy which replaces the route only when the whole advice
//! succeeded.
//!
//! ```rust,ignore
//! engine.advice_with("orders", |a| {
//!     a.weave_by_to_string(".*bar.*").replace(|s| s.multicast(|m| m.to("mock:a").to("mock:b")))?;
//!     a.replace_from_with("direct:test");
//!     Ok(())
//! })?;
//! ```

mod advice_with;
mod matcher;
mod weave;

pub use advice_with::{AdviceWithRoute, InterceptSendBuilder, WeaveBuilder};
pub use matcher::{NodePath, NodeRef, find_by_endpoint_uri, find_by_id, find_by_to_string, find_by_type, index, node_at, parent_of};
pub use weave::{Selection, WeaveEdit, WeaveOperation, WeaveSelector, apply_edit, apply_edits};
