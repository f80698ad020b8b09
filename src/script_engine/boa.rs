use crate::model::Response;
use crate::script_engine::{globals_script, response_script, Globals, Script, ScriptEngine, INIT_SCRIPT};
use crate::Result;
use boa_engine::{Context, JsError, Source};
use tracing::info;

/// Evaluates every script in a new `Context`, nothing leaks between runs
/// except what goes through the global store.
#[derive(Default)]
pub struct BoaScriptEngine;

impl BoaScriptEngine {
    pub fn new() -> BoaScriptEngine {
        BoaScriptEngine
    }
}

impl ScriptEngine for BoaScriptEngine {
    fn execute_script(
        &mut self,
        script: &Script,
        response: Option<&Response>,
        globals: &mut Globals,
    ) -> Result<String> {
        let mut context = Context::default();
        eval(&mut context, &globals_script(globals)?)?;
        eval(&mut context, INIT_SCRIPT)?;
        if let Some(response) = response {
            eval(&mut context, &response_script(response)?)?;
        }

        let result = eval(&mut context, script.src);

        let logs: Vec<String> = serde_json::from_str(&eval(&mut context, "JSON.stringify(_logs)")?)?;
        for line in logs {
            info!("{}", line);
        }
        *globals = Globals::from_snapshot(&eval(&mut context, "JSON.stringify(_snapshot)")?)?;

        result
    }
}

fn eval(context: &mut Context, src: &str) -> Result<String> {
    let value = context
        .eval(Source::from_bytes(src))
        .map_err(|e| script_error(e, context))?;
    let text = value
        .to_string(context)
        .map_err(|e| script_error(e, context))?;
    Ok(text.to_std_string_escaped())
}

/// The thrown value converted to a string, so `throw "msg"` reads as `msg`.
fn script_error(error: JsError, context: &mut Context) -> anyhow::Error {
    let thrown = error.to_opaque(context);
    match thrown.to_string(context) {
        Ok(message) => anyhow!("{}", message.to_std_string_escaped()),
        Err(_) => anyhow!("{}", error),
    }
}
