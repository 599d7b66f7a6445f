//! Sandboxed evaluation of custom script steps
//!
//! Scripts are minijinja templates rendered in an environment with no
//! loader, so they cannot reach the filesystem, the network or the process.
//! A fuel budget bounds how long a script can run.

use super::types::{HandlerError, HandlerResult, Outcome, ScriptRunner};
use crate::config::{ScriptSettings, StepParams};
use async_trait::async_trait;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value, context};
use std::sync::{Arc, Mutex};

/// Script runner backed by a restricted minijinja environment
#[derive(Debug, Clone)]
pub struct SandboxedScripts {
    fuel: u64,
}

impl SandboxedScripts {
    pub fn from_settings(settings: &ScriptSettings) -> Self {
        Self {
            fuel: settings.fuel,
        }
    }

    /// Render `code` against `params`, blocking the current thread
    fn render(fuel: u64, code: &str, params: &StepParams) -> HandlerResult<String> {
        let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_fuel(Some(fuel));

        let slot = Arc::clone(&failure);
        env.add_function("fail", move |message: String| -> Result<String, Error> {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(message.clone());
            }
            Err(Error::new(ErrorKind::InvalidOperation, message))
        });

        let ctx = context! { params => Value::from_serialize(params.as_map()) };
        match env.render_str(code, ctx) {
            Ok(output) => Ok(Outcome::Success(output.trim().to_string())),
            Err(e) => {
                let raised = failure.lock().ok().and_then(|mut slot| slot.take());
                if let Some(message) = raised {
                    return Ok(Outcome::Failure { message });
                }
                match e.kind() {
                    ErrorKind::SyntaxError => Err(HandlerError::Script {
                        message: e.to_string(),
                    }),
                    ErrorKind::OutOfFuel => Ok(Outcome::failure(
                        "script exceeded its evaluation budget",
                    )),
                    _ => Ok(Outcome::failure(format!("script error: {e}"))),
                }
            }
        }
    }
}

impl Default for SandboxedScripts {
    fn default() -> Self {
        Self::from_settings(&ScriptSettings::default())
    }
}

#[async_trait]
impl ScriptRunner for SandboxedScripts {
    async fn run(&self, code: &str, params: &StepParams) -> HandlerResult<String> {
        let fuel = self.fuel;
        let code = code.to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || Self::render(fuel, &code, &params))
            .await
            .map_err(|e| HandlerError::Script {
                message: format!("script task aborted: {e}"),
            })?
    }
}
