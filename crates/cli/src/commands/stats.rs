use crate::cli::StatsArgs;
use crate::commands::{Context, print_stats};
use anyhow::bail;
use std::fs::File;
use tracker::geodesy::compute_trip_stats;
use tracker::policy::thin_route;
use tracker::position::read_fixes;

pub(super) fn stats(ctx: &Context, args: StatsArgs) -> anyhow::Result<()> {
    let fixes = read_fixes(File::open(&args.file)?)?;
    let (Some(first), Some(last)) = (fixes.first(), fixes.last()) else {
        bail!("no fixes in {}", args.file.display());
    };

    let route = if args.thin {
        let recording = args.recording.apply(ctx.config.recording);
        recording.validate()?;
        thin_route(&fixes, &recording)
    } else {
        fixes.clone()
    };

    print_stats(&compute_trip_stats(&route, first.timestamp, last.timestamp));
    Ok(())
}
