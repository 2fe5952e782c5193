//! Core domain types: project descriptors, workspace resolution, and
//! metadata merging.

pub mod merge;
pub mod project;
pub mod requirement;
pub mod requires;
pub mod workspace;

pub use merge::{merge, MergedDescriptor};
pub use project::{DynamicField, License, ModuleSource, ProjectDescriptor};
pub use requirement::Requirement;
pub use requires::RequiresPython;
pub use workspace::{Workspace, WorkspaceSpec};
