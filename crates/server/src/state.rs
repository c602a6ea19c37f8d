use std::sync::Arc;
use tracing::warn;
use vidgenie_core::{
    Config, ConversionOrchestrator, JobRegistry, OutputFormat, OutputMaterializer,
    ProgressPublisher, TranscodeEngine,
};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<dyn TranscodeEngine>,
    orchestrator: ConversionOrchestrator,
    publisher: ProgressPublisher,
}

impl AppState {
    /// Wires a fresh job registry into the orchestrator and publisher.
    pub fn new(config: Config, engine: Arc<dyn TranscodeEngine>) -> Self {
        let registry = Arc::new(JobRegistry::new());

        let allowed_formats: Vec<OutputFormat> = config
            .jobs
            .allowed_formats
            .iter()
            .filter_map(|raw| match raw.parse() {
                Ok(format) => Some(format),
                Err(e) => {
                    warn!("Ignoring allowed format {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        let orchestrator = ConversionOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&engine),
            OutputMaterializer::new(&config.storage.output_dir),
            &config.storage.working_dir,
        )
        .with_allowed_formats(allowed_formats)
        .with_max_job_duration(config.engine.max_job_duration());

        let publisher = ProgressPublisher::new(registry, config.jobs.poll_interval());

        Self {
            config,
            engine,
            orchestrator,
            publisher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &dyn TranscodeEngine {
        self.engine.as_ref()
    }

    pub fn orchestrator(&self) -> &ConversionOrchestrator {
        &self.orchestrator
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.orchestrator.registry()
    }

    pub fn publisher(&self) -> &ProgressPublisher {
        &self.publisher
    }
}
