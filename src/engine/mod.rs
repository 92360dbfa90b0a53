//! Conditional page-navigation engine
//!
//! Pure, synchronous evaluation shared by every rendering surface and by the
//! server-side submission path. Nothing in here touches storage or the network.

pub mod condition;
pub mod graph;
pub mod navigation;
pub mod normalize;
pub mod traversal;
pub mod visibility;

pub use condition::evaluate_condition;
pub use graph::FormGraph;
pub use navigation::{resolve_next_page, NextPage};
pub use normalize::{normalize_submission, project_record, record_columns, SubmissionMeta};
pub use traversal::{replay, ReplayError, Traversal};
pub use visibility::{is_field_visible, visible_fields};
