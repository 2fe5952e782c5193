//! Distribution assembly: archive layout, metadata rendering, and the
//! wheel/sdist writers.

pub mod layout;
pub mod metadata;
pub mod sdist;
pub mod wheel;

pub use layout::{ArchiveManifest, ManifestEntry};
pub use metadata::DistName;
pub use sdist::SdistWriter;
pub use wheel::{ArtifactSink, MetadataDir, WheelWriter};
