use std::path::PathBuf;

use clap::Args;
use ferry_schema::{IndexBody, MappingOptions, Settings, merge_settings, synthesize};
use ferry_writer::WriterConfig;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{JsonEncodeSnafu, Result, SchemaSnafu},
    store::load_config,
};

/// Default major version assumed when neither the flag nor the job
/// configuration names one.
const DEFAULT_MAJOR_VERSION: u32 = 7;

#[derive(Debug, Args)]
pub struct MappingArgs {
    /// Path to the job configuration (JSON)
    #[arg(long)]
    config: PathBuf,
    /// Major version of the target store
    #[arg(long)]
    es_version: Option<u32>,
}

impl MappingArgs {
    pub async fn run(self, _ct: CancellationToken) -> Result<()> {
        let config = load_config(&self.config).await?;
        config.validate()?;

        let major_version = self
            .es_version
            .or(config.es_version)
            .filter(|version| *version > 0)
            .unwrap_or(DEFAULT_MAJOR_VERSION);

        let body = index_body(&config, major_version)?;
        let text = serde_json::to_string_pretty(&body).context(JsonEncodeSnafu {})?;
        println!("{text}");

        Ok(())
    }
}

/// The body the index would be created with, ignoring settings retained
/// from a truncated index.
fn index_body(config: &WriterConfig, major_version: u32) -> Result<IndexBody> {
    let synthesized = synthesize(
        &config.columns,
        &MappingOptions {
            type_name: config.type_name().to_string(),
            v7_or_above: major_version >= 7,
            dst_dynamic: config.dst_dynamic.clone(),
        },
    )
    .context(SchemaSnafu {})?;

    let mut settings = Settings::new();
    merge_settings(&mut settings, &config.settings);

    Ok(IndexBody::new(
        settings,
        synthesized.mappings,
        config.dynamic,
    ))
}
