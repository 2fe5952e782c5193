//! Implementation of `wharf metadata`.

use anyhow::Result;
use wharf::BuildContext;

use crate::cli::MetadataArgs;
use crate::commands::report;

pub fn execute(args: MetadataArgs) -> Result<()> {
    let ctx = BuildContext::new(&args.root)?;

    report(wharf::prepare_metadata(&ctx, &args.target_dir))
}
