//! # campaigns-rewire
//!
//! Reconciles a campaign's desired changeset specs with the changesets it
//! currently holds.
//!
//! Call [`pipeline::preview`] to compute a [`RewirePlan`] without writing,
//! or [`pipeline::run`] to plan and apply it. [`Rewirer`] exposes the same
//! steps for callers that already hold a loaded [`campaigns_core::Campaign`].

pub mod apply;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod plan;
pub mod rewirer;

pub use apply::{AppliedOperation, ApplyReport};
pub use error::RewireError;
pub use index::{ChangesetIndex, RepoBranch, RepoExternalId};
pub use plan::{OperationKind, OperationSummary, RewireOperation, RewirePlan};
pub use rewirer::{load_associations, plan_campaign, Associations, Rewirer};
