//! Shared setup for commands: settings, logging, runtime and managers.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use roseveil::config::{data_dir, ConfigStore, Settings};
use roseveil::manager::{
    DetachedLauncher, ExecutableResolver, ExecutableValidator, HttpTransport, ManagerConfig,
    PatchInstaller, ReqwestTransport, SelfUpdater, SingleFlight,
};

use crate::commands::common::PromptSelector;
use crate::error::CliError;

/// Owns everything a command needs for one process run.
pub struct CliRunner {
    settings: Settings,
    runtime: tokio::runtime::Runtime,
    flight: SingleFlight,
    cancel: CancellationToken,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    /// Load settings, start logging and build the runtime.
    pub fn new() -> Result<Self, CliError> {
        let settings = Settings::load()?;

        // Logging problems should not stop the launcher from working.
        let log_guard = match roseveil::logging::init(&settings.logging) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Warning: file logging disabled: {}", e);
                None
            }
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            settings,
            runtime,
            // File locks keep concurrent launcher processes apart.
            flight: SingleFlight::with_lock_dir(data_dir().join("locks")),
            cancel: CancellationToken::new(),
            _log_guard: log_guard,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command,
            "roseveil starting"
        );
    }

    /// Cancel in-flight downloads on Ctrl+C.
    pub fn cancel_on_interrupt(&self) -> Result<(), CliError> {
        let token = self.cancel.clone();
        ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Interrupted, stopping download...");
            token.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
    }

    /// Run a future to completion on the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Executable resolver; `interactive` enables the path prompt.
    pub fn resolver(&self, interactive: bool) -> ExecutableResolver {
        let store = Arc::new(ConfigStore::open_default());
        let resolver =
            ExecutableResolver::new(store, ExecutableValidator::from_settings(&self.settings.exe));
        if interactive {
            resolver.with_selector(Arc::new(PromptSelector))
        } else {
            resolver
        }
    }

    fn transport(&self) -> Result<Arc<dyn HttpTransport>, CliError> {
        let transport = ReqwestTransport::new(self.settings.network.request_timeout())?;
        Ok(Arc::new(transport))
    }

    /// Patch installer wired to the shared single-flight state.
    pub fn installer(&self, interactive: bool) -> Result<PatchInstaller, CliError> {
        let config = ManagerConfig::from_settings(&self.settings);
        if config.manifest_url.is_empty() {
            return Err(CliError::Config(
                "No patch manifest URL. Set patch.manifest_url with 'roseveil config set'."
                    .to_string(),
            ));
        }
        Ok(
            PatchInstaller::new(config, self.transport()?, self.resolver(interactive))
                .with_flight(self.flight.clone())
                .with_cancellation(self.cancel.clone()),
        )
    }

    /// Launcher self-updater.
    pub fn updater(&self) -> Result<SelfUpdater, CliError> {
        let config = ManagerConfig::from_settings(&self.settings);
        Ok(
            SelfUpdater::new(&config, self.transport()?, Arc::new(DetachedLauncher::new()))
                .with_flight(self.flight.clone())
                .with_cancellation(self.cancel.clone()),
        )
    }
}
