//! Wait conditions applied to a loaded page before its markup is captured

use crate::error::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settle time used when no condition is configured
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Window property where the event tracker records fired events
pub const EVENT_REGISTRY: &str = "__pagemapEvents";

/// When the rendered page counts as done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WaitCondition {
    /// Fixed delay
    Delay { ms: u64 },

    /// A window event; not firing in time is an error
    Event {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },

    /// A truthy `window[fn]`
    Function {
        #[serde(rename = "fn")]
        function: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },

    /// A `document.querySelector` match
    Selector {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
}

impl WaitCondition {
    pub fn timeout(&self) -> Duration {
        match self {
            Self::Delay { ms } => Duration::from_millis(*ms),
            Self::Event { timeout, .. } | Self::Function { timeout, .. } | Self::Selector { timeout, .. } => {
                timeout.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT)
            }
        }
    }

    /// Script expression that is truthy once the condition holds
    fn ready_expression(&self) -> Option<String> {
        match self {
            Self::Delay { .. } => None,
            Self::Event { name, .. } => Some(format!(
                "Boolean(window.{reg} && window.{reg}[{name}])",
                reg = EVENT_REGISTRY,
                name = js_string(name)
            )),
            Self::Function { function, .. } => Some(format!("Boolean(window[{}])", js_string(function))),
            Self::Selector { value, .. } => Some(format!(
                "document.querySelector({}) !== null",
                js_string(value)
            )),
        }
    }
}

/// Script installed ahead of the page's own scripts so that an event fired
/// during load is not missed
pub fn event_tracker_script(name: &str) -> String {
    format!(
        "(function(){{var r=window.{reg}=window.{reg}||{{}};window.addEventListener({name},function(){{r[{name}]=true;}});}})();",
        reg = EVENT_REGISTRY,
        name = js_string(name)
    )
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// A loaded page that can evaluate script expressions
pub trait PageContext {
    fn evaluate(&self, expression: &str) -> RenderResult<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// No condition: waited the settle delay
    Settled,
    /// Waited a fixed delay
    Delayed,
    /// The condition held within its timeout
    Satisfied,
    /// Polling gave up; extraction goes ahead anyway
    TimedOut,
}

/// Block until `condition` holds, its timeout elapses, or its delay passes.
///
/// Runs on a blocking thread: the browser session it polls is synchronous.
pub fn apply_wait_condition(
    page: &dyn PageContext,
    condition: Option<&WaitCondition>,
) -> RenderResult<WaitOutcome> {
    let Some(condition) = condition else {
        thread::sleep(SETTLE_DELAY);
        return Ok(WaitOutcome::Settled);
    };

    let timeout = condition.timeout();
    let Some(expression) = condition.ready_expression() else {
        thread::sleep(timeout);
        return Ok(WaitOutcome::Delayed);
    };

    let started = Instant::now();
    loop {
        if is_truthy(&page.evaluate(&expression)?) {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Wait condition satisfied");
            return Ok(WaitOutcome::Satisfied);
        }
        if started.elapsed() >= timeout {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    match condition {
        WaitCondition::Event { name, .. } => Err(RenderError::EventTimeout {
            name: name.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }),
        _ => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Wait condition timeout, capturing anyway");
            Ok(WaitOutcome::TimedOut)
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
