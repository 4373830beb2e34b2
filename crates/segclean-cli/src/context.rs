//! Per-run wiring: config, segment source, gateway and plan building.

use crate::client::ApiClient;
use crate::output::{CliError, OutputMode, render_error};
use anyhow::Result;
use segclean_core::config::{Config, LoadedConfig, resolve_config};
use segclean_core::error::ErrorCode;
use segclean_core::gateway::{BatchRunner, DryRunGateway, MutationGateway};
use segclean_core::source::{FileSource, SegmentSource, SourceError};
use segclean_core::{MatchPolicy, NameFilter, Plan, Segment, timing};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub from_file: Option<PathBuf>,
    pub filter: Option<String>,
    pub policy: Option<MatchPolicy>,
    pub dry_run: bool,
}

pub struct RunContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub output: OutputMode,
    pub policy: MatchPolicy,
    pub dry_run: bool,
    filter: Option<String>,
    source: Box<dyn SegmentSource>,
}

impl RunContext {
    /// Resolve config and pick the segment source.
    pub fn open(options: &GlobalOptions, output: OutputMode) -> Result<Self> {
        let LoadedConfig { config, path } = match resolve_config(options.config.as_deref()) {
            Ok(loaded) => loaded,
            Err(err) => {
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
                )?;
                return Err(err);
            }
        };
        debug!(path = ?path, "resolved config");

        let source: Box<dyn SegmentSource> = match &options.from_file {
            Some(file) => Box::new(FileSource::new(file)),
            None => Box::new(Self::api_client(&config, output)?),
        };

        Ok(Self {
            policy: options.policy.unwrap_or(config.merge.policy),
            config,
            config_path: path,
            output,
            dry_run: options.dry_run,
            filter: options.filter.clone().filter(|f| !f.is_empty()),
            source,
        })
    }

    #[cfg(test)]
    pub fn with_source(source: Box<dyn SegmentSource>, output: OutputMode) -> Self {
        Self {
            config: Config::default(),
            config_path: None,
            output,
            policy: MatchPolicy::default(),
            dry_run: true,
            filter: None,
            source,
        }
    }

    fn api_client(config: &Config, output: OutputMode) -> Result<ApiClient> {
        ApiClient::from_config(&config.api).map_err(|err| report_source_error(output, err))
    }

    pub fn filter_search(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn source(&self) -> &dyn SegmentSource {
        self.source.as_ref()
    }

    /// Fetch the full store, rendering the error on failure.
    pub fn fetch(&self) -> Result<Vec<Segment>> {
        info!(source = %self.source.describe(), "fetching segments");
        timing::timed("source.fetch", || self.source.fetch_all())
            .map_err(|err| report_source_error(self.output, err))
    }

    /// Gateway for mutations: a recorder under `--dry-run`, the API otherwise.
    pub fn gateway(&self) -> Result<Box<dyn MutationGateway>> {
        if self.dry_run {
            return Ok(Box::new(DryRunGateway::new()));
        }
        Ok(Box::new(Self::api_client(&self.config, self.output)?))
    }

    pub fn runner(&self) -> BatchRunner {
        if self.dry_run {
            BatchRunner::immediate(self.config.delete.mode)
        } else {
            self.config.runner()
        }
    }

    pub fn dump_dir(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.config.diagnostics.dir.clone(), Path::to_path_buf)
    }

    /// Plan for `segments` honoring `--filter`.
    ///
    /// A filter that matches no base name is reported and returned as an error.
    pub fn plan(&self, segments: &[Segment]) -> Result<Plan> {
        let unfiltered = Plan::build(segments, &NameFilter::none(), self.policy);
        let Some(search) = self.filter_search() else {
            return Ok(unfiltered);
        };

        let Some(filter) = NameFilter::from_search(search, &unfiltered.classification.base_names)
        else {
            let message = format!("No matches found for '{search}'");
            render_error(
                self.output,
                &CliError::from_code(ErrorCode::FilterNoMatch, message.clone()),
            )?;
            anyhow::bail!(message);
        };
        Ok(Plan::build(segments, &filter, self.policy))
    }

    /// Fetch and plan in one step.
    pub fn load_plan(&self) -> Result<Plan> {
        let segments = self.fetch()?;
        self.plan(&segments)
    }
}

/// Render a source error with its code and turn it into an `anyhow` error.
pub fn report_source_error(output: OutputMode, err: SourceError) -> anyhow::Error {
    let code = err.code();
    let rendered = render_error(output, &CliError::from_code(code, err.to_string()));
    match rendered {
        Ok(()) => anyhow::Error::new(err),
        Err(render_err) => render_err.context(err.to_string()),
    }
    .context(code.message())
}

/// Config path for display.
pub fn describe_config(path: Option<&Path>) -> String {
    path.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string())
}
