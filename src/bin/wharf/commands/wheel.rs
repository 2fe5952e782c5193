//! Implementation of `wharf wheel`.

use anyhow::Result;
use wharf::{BuildContext, WheelOptions};

use crate::cli::WheelArgs;
use crate::commands::report;

pub fn execute(args: WheelArgs) -> Result<()> {
    let ctx = BuildContext::new(&args.root)?;
    let options = WheelOptions {
        editable: args.editable,
        metadata_dir: args.metadata_dir,
    };

    report(wharf::build_wheel(&ctx, &args.target_dir, &options))
}
