//! High-level operations.
//!
//! This module contains the implementation of the build-protocol hooks.

pub mod backend;

pub use backend::{
    build_sdist, build_wheel, get_requires_for_build, prepare_metadata, BuildKind, WheelOptions,
};
