//! Command implementations.

pub mod completions;
pub mod metadata;
pub mod requires;
pub mod sdist;
pub mod wheel;

use anyhow::Result;
use wharf::errors::BuildError;

/// Report a pipeline result: the artifact name goes to stdout for the
/// calling frontend, failures carry the phase they arose in.
pub fn report(result: std::result::Result<String, BuildError>) -> Result<()> {
    match result {
        Ok(name) => {
            println!("{name}");
            Ok(())
        }
        Err(e) => {
            let phase = e.phase();
            Err(anyhow::Error::new(e).context(format!("{phase} phase failed")))
        }
    }
}
