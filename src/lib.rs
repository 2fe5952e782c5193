//! Wharf - a monorepo build backend.
//!
//! This crate provides the core library functionality for Wharf:
//! discovering workspace members, merging their metadata into one
//! distribution descriptor, and assembling wheel or sdist archives.

pub mod core;
pub mod dist;
pub mod errors;
pub mod ops;
pub mod util;

pub use crate::core::{
    merge::MergedDescriptor, project::ProjectDescriptor, requirement::Requirement,
    requires::RequiresPython, workspace::Workspace, workspace::WorkspaceSpec,
};

pub use crate::errors::{BuildError, Conflict, Phase};
pub use crate::ops::{
    build_sdist, build_wheel, get_requires_for_build, prepare_metadata, BuildKind, WheelOptions,
};
pub use crate::util::BuildContext;
