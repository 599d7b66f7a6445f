//! Step kind to handler dispatch table

use crate::config::{
    AppConfig, DEFAULT_WAIT_SECS, MAX_WAIT_SECS, Step, StepKind, StepParams, check_wait_secs,
};
use crate::handlers::{
    FileOperations, HandlerError, HttpScraper, LocalFileOperations, Outcome, SandboxedScripts,
    ScriptRunner, TransferMode, WebScraper,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors while executing a single step
///
/// Every variant ends up as the `error` of a failed step result.
#[derive(Debug, Error)]
pub enum StepExecutionError {
    #[error("missing required parameter '{name}' for {kind} step")]
    MissingParameter { kind: StepKind, name: &'static str },

    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Failure reported by the handler itself
    #[error("{message}")]
    HandlerFailure { message: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("custom scripts are disabled in the configuration")]
    ScriptsDisabled,
}

impl StepExecutionError {
    fn missing(kind: &StepKind, name: &'static str) -> Self {
        Self::MissingParameter {
            kind: kind.clone(),
            name,
        }
    }
}

/// Surface a handler-reported failure as an error
fn into_summary(outcome: Outcome<String>) -> Result<String, StepExecutionError> {
    match outcome {
        Outcome::Success(summary) => Ok(summary),
        Outcome::Failure { message } => Err(StepExecutionError::HandlerFailure { message }),
    }
}

fn required<'a>(
    kind: &StepKind,
    params: &'a StepParams,
    name: &'static str,
) -> Result<&'a str, StepExecutionError> {
    params
        .text(name)
        .ok_or_else(|| StepExecutionError::missing(kind, name))
}

/// Maps each step kind to the handler that performs it
pub struct StepDispatcher {
    files: Arc<dyn FileOperations>,
    web: Arc<dyn WebScraper>,
    scripts: Arc<dyn ScriptRunner>,
    scripts_enabled: bool,
    simulation_delay: Duration,
}

impl StepDispatcher {
    /// Create a dispatcher over explicit handlers
    pub fn new(
        files: Arc<dyn FileOperations>,
        web: Arc<dyn WebScraper>,
        scripts: Arc<dyn ScriptRunner>,
    ) -> Self {
        let defaults = AppConfig::default();
        Self {
            files,
            web,
            scripts,
            scripts_enabled: defaults.scripts.enabled,
            simulation_delay: Duration::from_millis(defaults.engine.simulation_delay_ms),
        }
    }

    /// Create a dispatcher with the built-in handlers
    pub fn from_config(config: &AppConfig) -> Result<Self, HandlerError> {
        let dispatcher = Self::new(
            Arc::new(LocalFileOperations::new()),
            Arc::new(HttpScraper::from_settings(&config.web)?),
            Arc::new(SandboxedScripts::from_settings(&config.scripts)),
        )
        .with_scripts_enabled(config.scripts.enabled)
        .with_simulation_delay(Duration::from_millis(config.engine.simulation_delay_ms));

        Ok(dispatcher)
    }

    pub fn with_scripts_enabled(mut self, enabled: bool) -> Self {
        self.scripts_enabled = enabled;
        self
    }

    pub fn with_simulation_delay(mut self, delay: Duration) -> Self {
        self.simulation_delay = delay;
        self
    }

    /// Execute one step and return its success summary
    pub async fn dispatch(&self, step: &Step) -> Result<String, StepExecutionError> {
        let params = &step.parameters;

        match &step.kind {
            StepKind::Wait => self.wait(params).await,
            StepKind::CopyFiles => self.transfer(&step.kind, params, TransferMode::Copy).await,
            StepKind::MoveFiles => self.transfer(&step.kind, params, TransferMode::Move).await,
            StepKind::ExtractWeb => self.extract(&step.kind, params).await,
            StepKind::CustomScript => self.script(params).await,
            other => self.simulate(other).await,
        }
    }

    async fn wait(&self, params: &StepParams) -> Result<String, StepExecutionError> {
        let requested = match params
            .number("seconds")
            .map(|secs| secs.and_then(check_wait_secs))
        {
            None => DEFAULT_WAIT_SECS,
            Some(Ok(secs)) => secs,
            Some(Err(message)) => {
                return Err(StepExecutionError::InvalidParameter {
                    name: "seconds",
                    message,
                });
            }
        };

        let effective = requested.min(MAX_WAIT_SECS);
        tracing::debug!(requested, effective, "waiting");
        tokio::time::sleep(Duration::from_secs_f64(effective)).await;

        Ok(format!("waited {requested}s"))
    }

    async fn transfer(
        &self,
        kind: &StepKind,
        params: &StepParams,
        mode: TransferMode,
    ) -> Result<String, StepExecutionError> {
        let source = required(kind, params, "source")?;
        let destination = required(kind, params, "destination")?;
        let extension = params.text("extension");

        let outcome = self
            .files
            .copy_or_move(source, destination, extension, mode)
            .await?;
        into_summary(outcome)
    }

    async fn extract(
        &self,
        kind: &StepKind,
        params: &StepParams,
    ) -> Result<String, StepExecutionError> {
        let url = required(kind, params, "url")?;
        let selector = params.text("selector");

        let text = into_summary(self.web.extract_content(url, selector).await?)?;
        Ok(format!("extracted {} characters", text.chars().count()))
    }

    async fn script(&self, params: &StepParams) -> Result<String, StepExecutionError> {
        let Some(code) = params.text("code") else {
            return Ok("empty script, nothing to run".to_string());
        };
        if !self.scripts_enabled {
            return Err(StepExecutionError::ScriptsDisabled);
        }

        let output = into_summary(self.scripts.run(code, params).await?)?;
        if output.is_empty() {
            Ok("script executed".to_string())
        } else {
            Ok(format!("script executed: {output}"))
        }
    }

    async fn simulate(&self, kind: &StepKind) -> Result<String, StepExecutionError> {
        tokio::time::sleep(self.simulation_delay).await;
        Ok(format!("step '{kind}' executed (simulated)"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::handlers::HandlerResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock file handler that records calls and replies with a canned outcome
    pub(crate) struct MockFiles {
        pub calls: Mutex<Vec<(String, String, Option<String>, TransferMode)>>,
        reply: Outcome<String>,
    }

    impl MockFiles {
        pub fn replying(reply: Outcome<String>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    #[async_trait]
    impl FileOperations for MockFiles {
        async fn copy_or_move(
            &self,
            source_dir: &str,
            dest_dir: &str,
            extension: Option<&str>,
            mode: TransferMode,
        ) -> HandlerResult<String> {
            self.calls.lock().unwrap().push((
                source_dir.to_string(),
                dest_dir.to_string(),
                extension.map(str::to_string),
                mode,
            ));
            Ok(self.reply.clone())
        }
    }

    /// Mock scraper returning a fixed page text
    pub(crate) struct MockWeb {
        reply: Outcome<String>,
    }

    impl MockWeb {
        pub fn replying(reply: Outcome<String>) -> Self {
            Self { reply }
        }
    }

    #[async_trait]
    impl WebScraper for MockWeb {
        async fn extract_content(&self, _url: &str, _selector: Option<&str>) -> HandlerResult<String> {
            Ok(self.reply.clone())
        }
    }

    /// Mock script runner that echoes the code back
    pub(crate) struct EchoScripts;

    #[async_trait]
    impl ScriptRunner for EchoScripts {
        async fn run(&self, code: &str, _params: &StepParams) -> HandlerResult<String> {
            Ok(Outcome::Success(code.to_string()))
        }
    }

    pub(crate) fn mock_dispatcher() -> StepDispatcher {
        StepDispatcher::new(
            Arc::new(MockFiles::replying(Outcome::Success("2 file(s) copied to /out".into()))),
            Arc::new(MockWeb::replying(Outcome::Success("hello world".into()))),
            Arc::new(EchoScripts),
        )
        .with_simulation_delay(Duration::from_millis(10))
    }

    fn step(kind: &str, params: StepParams) -> Step {
        Step::new(1, StepKind::parse(kind), "test step", params)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_defaults_to_five_seconds() {
        let dispatcher = mock_dispatcher();
        let start = tokio::time::Instant::now();

        let summary = dispatcher
            .dispatch(&step("wait", StepParams::new()))
            .await
            .unwrap();

        assert_eq!(summary, "waited 5s");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_accepts_numeric_string() {
        let dispatcher = mock_dispatcher();
        let summary = dispatcher
            .dispatch(&step("wait", StepParams::new().with("seconds", "1.5")))
            .await
            .unwrap();
        assert_eq!(summary, "waited 1.5s");
    }

    #[tokio::test]
    async fn test_wait_rejects_bad_values() {
        let dispatcher = mock_dispatcher();

        let err = dispatcher
            .dispatch(&step("wait", StepParams::new().with("seconds", "soon")))
            .await
            .unwrap_err();
        assert!(matches!(err, StepExecutionError::InvalidParameter { name: "seconds", .. }));

        let err = dispatcher
            .dispatch(&step("wait", StepParams::new().with("seconds", -3)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("negative"));

        for value in ["NaN", "inf"] {
            let err = dispatcher
                .dispatch(&step("wait", StepParams::new().with("seconds", value)))
                .await
                .unwrap_err();
            assert!(
                err.to_string().contains("not a finite, non-negative number"),
                "{value}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_copy_passes_parameters_through() {
        let files = Arc::new(MockFiles::replying(Outcome::Success("1 file(s) moved to /b".into())));
        let dispatcher = StepDispatcher::new(
            files.clone(),
            Arc::new(MockWeb::replying(Outcome::Success(String::new()))),
            Arc::new(EchoScripts),
        );

        let params = StepParams::new()
            .with("source", "/a")
            .with("destination", "/b")
            .with("extension", ".pdf");
        let summary = dispatcher.dispatch(&step("move_files", params)).await.unwrap();

        assert_eq!(summary, "1 file(s) moved to /b");
        let calls = files.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[(
                "/a".to_string(),
                "/b".to_string(),
                Some(".pdf".to_string()),
                TransferMode::Move
            )]
        );
    }

    #[tokio::test]
    async fn test_copy_requires_source() {
        let dispatcher = mock_dispatcher();
        let err = dispatcher
            .dispatch(&step("copy_files", StepParams::new().with("destination", "/b")))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required parameter 'source' for copy_files step"
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_surfaced() {
        let dispatcher = StepDispatcher::new(
            Arc::new(MockFiles::replying(Outcome::failure("source folder not found: /a"))),
            Arc::new(MockWeb::replying(Outcome::failure("HTTP 404 Not Found from http://x"))),
            Arc::new(EchoScripts),
        );

        let params = StepParams::new().with("source", "/a").with("destination", "/b");
        let err = dispatcher
            .dispatch(&step("copy_files", params))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "source folder not found: /a");

        let err = dispatcher
            .dispatch(&step("extract_web", StepParams::new().with("url", "http://x")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 Not Found from http://x");
    }

    #[tokio::test]
    async fn test_extract_counts_characters() {
        let dispatcher = mock_dispatcher();
        let summary = dispatcher
            .dispatch(&step("extract_web", StepParams::new().with("url", "http://x")))
            .await
            .unwrap();
        assert_eq!(summary, "extracted 11 characters");
    }

    #[tokio::test]
    async fn test_script_summaries() {
        let dispatcher = mock_dispatcher();

        let summary = dispatcher
            .dispatch(&step("custom_script", StepParams::new().with("code", "   ")))
            .await
            .unwrap();
        assert_eq!(summary, "empty script, nothing to run");

        let summary = dispatcher
            .dispatch(&step("custom_script", StepParams::new().with("code", "ok")))
            .await
            .unwrap();
        assert_eq!(summary, "script executed: ok");
    }

    #[tokio::test]
    async fn test_disabled_scripts_fail() {
        let dispatcher = mock_dispatcher().with_scripts_enabled(false);

        let err = dispatcher
            .dispatch(&step("custom_script", StepParams::new().with("code", "ok")))
            .await
            .unwrap_err();
        assert!(matches!(err, StepExecutionError::ScriptsDisabled));

        // Empty scripts never reach the sandbox
        assert!(
            dispatcher
                .dispatch(&step("custom_script", StepParams::new()))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unknown_and_unexecuted_kinds_are_simulated() {
        let dispatcher = mock_dispatcher();

        let summary = dispatcher
            .dispatch(&step("launch_rocket", StepParams::new()))
            .await
            .unwrap();
        assert_eq!(summary, "step 'launch_rocket' executed (simulated)");

        let summary = dispatcher
            .dispatch(&step("send_email", StepParams::new()))
            .await
            .unwrap();
        assert_eq!(summary, "step 'send_email' executed (simulated)");
    }
}
