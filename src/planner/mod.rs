//! Planning module for deployment operations.
//!
//! This module compares a tracked deployment with a new declaration and
//! decides, through the field mutability policy, how the change is applied.

mod diff;
mod plan;
mod policy;

pub use diff::{DiffEngine, DiffResult, FieldChange};
pub use plan::{Plan, PlannedAction, PlannedState};
pub use policy::{
    FIELD_POLICIES, Field, Mutability, WireSection, build_create_request, build_update_request,
    create_sections, update_sections, updatable_sections,
};
