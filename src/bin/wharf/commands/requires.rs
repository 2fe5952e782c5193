//! Implementation of `wharf requires`.

use anyhow::Result;
use wharf::BuildKind;

use crate::cli::RequiresArgs;

pub fn execute(args: RequiresArgs) -> Result<()> {
    let kind: BuildKind = args.kind.parse()?;
    let requires = wharf::get_requires_for_build(kind);

    // the frontend consumes this as a JSON array
    println!("{}", serde_json::to_string(&requires)?);
    Ok(())
}
