//! Implementation of `wharf sdist`.

use anyhow::Result;
use wharf::BuildContext;

use crate::cli::SdistArgs;
use crate::commands::report;

pub fn execute(args: SdistArgs) -> Result<()> {
    let ctx = BuildContext::new(&args.root)?;

    report(wharf::build_sdist(&ctx, &args.target_dir))
}
