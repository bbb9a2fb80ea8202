use crate::cli::SettingsCommand;
use crate::commands::Context;
use crate::error::Error;
use tracker::persistence::{SettingsStore, TomlSettingsStore};
use tracing::info;

#[allow(clippy::print_stdout)]
pub(super) async fn settings(ctx: &Context, command: SettingsCommand) -> anyhow::Result<()> {
    match command {
        SettingsCommand::Show => {
            let recording = &ctx.config.recording;
            println!("mode:          {}", recording.mode);
            println!("interval:      {}s", recording.interval.as_secs());
            println!("min distance:  {}m", recording.min_distance_meters);
            Ok(())
        }
        SettingsCommand::Set(args) => {
            let path = ctx.conffile.as_ref().ok_or(Error::NoConfigFile)?;
            if args.is_empty() {
                return Err(Error::EmptyUpdate.into());
            }

            let recording = args.apply(ctx.config.recording);
            recording.validate()?;
            TomlSettingsStore::new(path).save(&recording).await?;
            info!(path = %path.display(), mode = %recording.mode, "recording settings saved");
            Ok(())
        }
    }
}
