//! Parsing and execution of the model's `do(...)` / `finish(...)` answers.

use std::time::Duration;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::time::sleep;

use crate::adb::AdbDevice;

/// Upper bound (exclusive) of the model's relative coordinate space.
pub const RELATIVE_COORDINATE_MAX: f64 = 1000.0;

/// Longest `Wait` the handler will honour.
const MAX_WAIT: Duration = Duration::from_secs(30);

/// Action errors.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to parse action: {0}")]
    ParseError(String),
}

/// Result of an action execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub success: bool,
    pub should_finish: bool,
    pub message: Option<String>,
}

impl ActionResult {
    pub fn success() -> Self {
        Self {
            success: true,
            should_finish: false,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_finish: false,
            message: Some(message.into()),
        }
    }

    pub fn finish(message: Option<String>) -> Self {
        Self {
            success: true,
            should_finish: true,
            message,
        }
    }
}

/// Decides whether a sensitive tap (payment, privacy) may go ahead.
pub type ConfirmationCallback = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Notified when the model asks a human to take over (login, captcha).
pub type TakeoverCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Executes parsed actions against a device.
///
/// The server has no console to ask, so the default callbacks are headless:
/// sensitive taps are declined and takeover requests are only logged.
pub struct ActionHandler {
    confirmation_callback: ConfirmationCallback,
    takeover_callback: TakeoverCallback,
}

impl Default for ActionHandler {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ActionHandler {
    pub fn new(
        confirmation_callback: Option<ConfirmationCallback>,
        takeover_callback: Option<TakeoverCallback>,
    ) -> Self {
        Self {
            confirmation_callback: confirmation_callback
                .unwrap_or_else(|| Box::new(decline_sensitive)),
            takeover_callback: takeover_callback.unwrap_or_else(|| Box::new(log_takeover)),
        }
    }

    /// Handler that lets sensitive taps through without asking.
    pub fn allowing_sensitive() -> Self {
        Self::new(
            Some(Box::new(|message: &str| {
                tracing::warn!("Sensitive operation auto-approved: {}", message);
                true
            })),
            None,
        )
    }

    /// Execute an action on `device`, whose screen is `width` x `height` pixels.
    pub async fn execute(
        &self,
        device: &AdbDevice,
        action: &Value,
        width: u32,
        height: u32,
    ) -> ActionResult {
        match action.get("_metadata").and_then(Value::as_str) {
            Some("finish") => ActionResult::finish(str_field(action, "message").map(str::to_string)),
            Some("do") => {
                let screen = Screen { width, height };
                let name = str_field(action, "action").unwrap_or("");
                self.handle_do(device, name, action, screen).await
            }
            other => ActionResult::failure(format!(
                "Unknown action type: {}",
                other.unwrap_or("<missing>")
            )),
        }
    }

    async fn handle_do(
        &self,
        device: &AdbDevice,
        name: &str,
        action: &Value,
        screen: Screen,
    ) -> ActionResult {
        let outcome = match name {
            "Launch" => {
                let Some(app) = str_field(action, "app") else {
                    return ActionResult::failure("No app name specified");
                };
                match device.launch_app(app).await {
                    Ok(true) => Ok(()),
                    Ok(false) => return ActionResult::failure(format!("App not found: {}", app)),
                    Err(e) => Err(e),
                }
            }
            "Tap" => {
                let (x, y) = match screen.point(action, "element") {
                    Ok(p) => p,
                    Err(result) => return result,
                };
                if let Some(message) = str_field(action, "message") {
                    if !(self.confirmation_callback)(message) {
                        return ActionResult {
                            success: false,
                            should_finish: true,
                            message: Some("User cancelled sensitive operation".to_string()),
                        };
                    }
                }
                device.tap(x, y).await
            }
            "Double Tap" => match screen.point(action, "element") {
                Ok((x, y)) => device.double_tap(x, y).await,
                Err(result) => return result,
            },
            "Long Press" => match screen.point(action, "element") {
                Ok((x, y)) => device.long_press(x, y).await,
                Err(result) => return result,
            },
            "Swipe" => {
                let start = match screen.point(action, "start") {
                    Ok(p) => p,
                    Err(result) => return result,
                };
                let end = match screen.point(action, "end") {
                    Ok(p) => p,
                    Err(result) => return result,
                };
                device.swipe(start, end).await
            }
            "Type" | "Type_Name" => {
                device
                    .replace_text(str_field(action, "text").unwrap_or(""))
                    .await
            }
            "Back" => device.back().await,
            "Home" => device.home().await,
            "Wait" => {
                sleep(parse_wait(str_field(action, "duration"))).await;
                Ok(())
            }
            "Take_over" => {
                (self.takeover_callback)(
                    str_field(action, "message").unwrap_or("User intervention required"),
                );
                Ok(())
            }
            "Note" | "Call_API" => Ok(()),
            "Interact" => {
                return ActionResult {
                    message: Some("User interaction required".to_string()),
                    ..ActionResult::success()
                }
            }
            _ => return ActionResult::failure(format!("Unknown action: {}", name)),
        };

        match outcome {
            Ok(()) => ActionResult::success(),
            Err(e) => {
                tracing::warn!("Action {} failed: {}", name, e);
                ActionResult::failure(e.to_string())
            }
        }
    }
}

fn decline_sensitive(message: &str) -> bool {
    tracing::warn!("Sensitive operation declined (no operator to confirm): {}", message);
    false
}

fn log_takeover(message: &str) {
    tracing::warn!("Manual takeover requested: {}", message);
}

fn str_field<'a>(action: &'a Value, key: &str) -> Option<&'a str> {
    action.get(key).and_then(Value::as_str)
}

#[derive(Debug, Clone, Copy)]
struct Screen {
    width: u32,
    height: u32,
}

impl Screen {
    /// Convert a relative `[x, y]` field (0..=999) to pixel coordinates.
    fn point(&self, action: &Value, key: &str) -> Result<(i32, i32), ActionResult> {
        let coords: Vec<f64> = action
            .get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| ActionResult::failure(format!("Missing {} coordinates", key)))?
            .iter()
            .filter_map(Value::as_f64)
            .collect();

        match coords.as_slice() {
            [x, y, ..] => Ok((
                to_pixel(*x, self.width),
                to_pixel(*y, self.height),
            )),
            _ => Err(ActionResult::failure(format!("Invalid {} coordinates", key))),
        }
    }
}

fn to_pixel(relative: f64, extent: u32) -> i32 {
    let max = extent.saturating_sub(1) as f64;
    (relative / RELATIVE_COORDINATE_MAX * extent as f64).clamp(0.0, max) as i32
}

fn parse_wait(duration: Option<&str>) -> Duration {
    let secs = duration
        .map(|d| d.replace("seconds", "").replace("second", ""))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs.min(MAX_WAIT.as_secs_f64()))
}

/// Parse an answer such as `do(action="Tap", element=[500, 300])`.
///
/// The result is a JSON object with `_metadata` set to `"do"` or `"finish"`
/// plus one field per keyword argument.
pub fn parse_action(response: &str) -> Result<Value, ActionError> {
    let response = response.trim();

    if let Some(args) = call_arguments(response, "do") {
        // Typed text often carries unescaped quotes; take it verbatim.
        if let Some(action) = typed_text_action(args) {
            return Ok(action);
        }
        let mut fields = parse_arguments(args)?;
        fields.insert("_metadata".to_string(), json!("do"));
        return Ok(Value::Object(fields));
    }

    if let Some(args) = call_arguments(response, "finish") {
        let mut fields = parse_arguments(args).unwrap_or_default();
        if !fields.contains_key("message") {
            if let Some(message) = args.trim().strip_prefix("message=") {
                fields.insert("message".to_string(), json!(unquote(message)));
            }
        }
        fields.insert("_metadata".to_string(), json!("finish"));
        return Ok(Value::Object(fields));
    }

    Err(ActionError::ParseError(response.to_string()))
}

/// Build a `do` action by hand.
pub fn do_action(action: &str, params: &[(&str, Value)]) -> Value {
    let mut result = json!({
        "_metadata": "do",
        "action": action
    });
    for (key, value) in params {
        result[*key] = value.clone();
    }
    result
}

/// Build a `finish` action by hand.
pub fn finish_action(message: Option<&str>) -> Value {
    let mut result = json!({ "_metadata": "finish" });
    if let Some(msg) = message {
        result["message"] = json!(msg);
    }
    result
}

fn call_arguments<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Split keyword arguments on top-level commas, honouring quotes and brackets.
fn split_arguments(args: &str) -> Result<Vec<&str>, ActionError> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ActionError::ParseError(format!("unbalanced ']' in {}", args)))?
            }
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return Err(ActionError::ParseError(format!("unterminated argument in {}", args)));
    }
    parts.push(&args[start..]);
    Ok(parts.into_iter().filter(|p| !p.trim().is_empty()).collect())
}

fn parse_arguments(args: &str) -> Result<Map<String, Value>, ActionError> {
    let mut fields = Map::new();
    for part in split_arguments(args)? {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ActionError::ParseError(format!("expected key=value, got {}", part)))?;
        fields.insert(key.trim().to_string(), parse_value(value.trim()));
    }
    Ok(fields)
}

fn parse_value(raw: &str) -> Value {
    if let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let items = inner
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_value)
            .collect();
        return Value::Array(items);
    }
    if is_quoted(raw) {
        return json!(unquote(raw));
    }
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    match raw {
        "True" | "true" => json!(true),
        "False" | "false" => json!(false),
        "None" | "null" => Value::Null,
        _ => json!(raw),
    }
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
}

/// Strip matching outer quotes and resolve simple backslash escapes.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let inner = if is_quoted(raw) { &raw[1..raw.len() - 1] } else { raw };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `action="Type"` / `action="Type_Name"` calls, parsed without tokenizing the text.
fn typed_text_action(args: &str) -> Option<Value> {
    let rest = args.trim_start().strip_prefix("action=")?;
    let name = ["Type", "Type_Name"].into_iter().find(|name| {
        rest.starts_with(&format!("\"{}\"", name)) || rest.starts_with(&format!("'{}'", name))
    })?;
    let text = raw_text_argument(args)?;
    Some(do_action(name, &[("text", json!(text))]))
}

/// Everything between `text="` and the closing quote at the end of the call.
fn raw_text_argument(args: &str) -> Option<String> {
    let start = args.find("text=")? + "text=".len();
    let rest = args[start..].trim();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let end = rest.rfind(quote).filter(|end| *end > 0)?;
    Some(rest[1..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_do_action() {
        let result = parse_action(r#"do(action="Tap", element=[100, 200])"#).unwrap();
        assert_eq!(result["_metadata"], "do");
        assert_eq!(result["action"], "Tap");
        assert_eq!(result["element"], json!([100, 200]));
    }

    #[test]
    fn test_parse_do_action_with_sensitive_message() {
        let result =
            parse_action(r#"do(action="Tap", element=[500,800], message="确认支付, 金额 12 元")"#)
                .unwrap();
        assert_eq!(result["message"], "确认支付, 金额 12 元");
        assert_eq!(result["element"], json!([500, 800]));
    }

    #[test]
    fn test_parse_swipe_and_wait() {
        let swipe = parse_action(r#"do(action="Swipe", start=[500, 800], end=[500, 200])"#).unwrap();
        assert_eq!(swipe["start"], json!([500, 800]));
        assert_eq!(swipe["end"], json!([500, 200]));

        let wait = parse_action(r#"do(action="Wait", duration="2 seconds")"#).unwrap();
        assert_eq!(wait["duration"], "2 seconds");
    }

    #[test]
    fn test_parse_type_keeps_inner_quotes() {
        let result = parse_action(r#"do(action="Type", text="He said "hi", then left")"#).unwrap();
        assert_eq!(result["text"], r#"He said "hi", then left"#);
    }

    #[test]
    fn test_parse_type_with_unbalanced_quotes() {
        let result = parse_action(r#"do(action="Type_Name", text="O"Brien")"#).unwrap();
        assert_eq!(result["action"], "Type_Name");
        assert_eq!(result["text"], r#"O"Brien"#);
    }

    #[test]
    fn test_parse_finish_action() {
        let result = parse_action(r#"finish(message="Task completed")"#).unwrap();
        assert_eq!(result["_metadata"], "finish");
        assert_eq!(result["message"], "Task completed");

        let unquoted = parse_action("finish(message=done (mostly))").unwrap();
        assert_eq!(unquoted["message"], "done (mostly)");
    }

    #[test]
    fn test_parse_action_rejects_free_text() {
        assert!(parse_action("I think we should tap the button").is_err());
        assert!(parse_action(r#"do(action="Tap", element=[1, 2)"#).is_err());
    }

    #[test]
    fn test_action_helpers() {
        let action = do_action("Tap", &[("element", json!([100, 200]))]);
        assert_eq!(action["_metadata"], "do");
        assert_eq!(action["action"], "Tap");

        let finish = finish_action(Some("Done"));
        assert_eq!(finish["_metadata"], "finish");
        assert_eq!(finish["message"], "Done");
    }

    #[test]
    fn test_relative_coordinates() {
        let screen = Screen {
            width: 1080,
            height: 2400,
        };
        let action = do_action("Tap", &[("element", json!([500, 500]))]);
        assert_eq!(screen.point(&action, "element").unwrap(), (540, 1200));

        let corner = do_action("Tap", &[("element", json!([999, 999]))]);
        assert_eq!(screen.point(&corner, "element").unwrap(), (1078, 2397));

        let outside = do_action("Tap", &[("element", json!([1500, -20]))]);
        assert_eq!(screen.point(&outside, "element").unwrap(), (1079, 0));

        let short = do_action("Tap", &[("element", json!([10]))]);
        assert!(screen.point(&short, "element").is_err());
    }

    #[test]
    fn test_parse_wait() {
        assert_eq!(parse_wait(Some("2 seconds")), Duration::from_secs(2));
        assert_eq!(parse_wait(Some("0.5 second")), Duration::from_millis(500));
        assert_eq!(parse_wait(Some("soon")), Duration::from_secs(1));
        assert_eq!(parse_wait(None), Duration::from_secs(1));
        assert_eq!(parse_wait(Some("600 seconds")), MAX_WAIT);
        assert_eq!(parse_wait(Some("1e30 seconds")), MAX_WAIT);
        assert_eq!(parse_wait(Some("-5 seconds")), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_execute_without_device_io() {
        // None of these actions reach adb.
        let handler = ActionHandler::default();
        let device = AdbDevice::new("/nonexistent/adb", None);

        let finish = handler
            .execute(&device, &finish_action(Some("Done")), 1080, 2400)
            .await;
        assert!(finish.should_finish);
        assert_eq!(finish.message.as_deref(), Some("Done"));

        let note = handler
            .execute(&device, &do_action("Note", &[("message", json!("True"))]), 1080, 2400)
            .await;
        assert_eq!(note, ActionResult::success());

        let unknown = handler
            .execute(&device, &do_action("Teleport", &[]), 1080, 2400)
            .await;
        assert!(!unknown.success);

        let missing_app = handler
            .execute(&device, &do_action("Launch", &[("app", json!("NoSuchApp"))]), 1080, 2400)
            .await;
        assert_eq!(missing_app.message.as_deref(), Some("App not found: NoSuchApp"));
    }

    #[tokio::test]
    async fn test_sensitive_tap_declined_by_default() {
        let handler = ActionHandler::default();
        let device = AdbDevice::new("/nonexistent/adb", None);
        let action = do_action(
            "Tap",
            &[("element", json!([500, 500])), ("message", json!("pay"))],
        );

        let result = handler.execute(&device, &action, 1080, 2400).await;
        assert!(result.should_finish);
        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("User cancelled sensitive operation")
        );
    }

    #[tokio::test]
    async fn test_device_failure_is_reported() {
        let handler = ActionHandler::allowing_sensitive();
        let device = AdbDevice::new("/nonexistent/adb", None);

        let result = handler.execute(&device, &do_action("Back", &[]), 1080, 2400).await;
        assert!(!result.success);
        assert!(!result.should_finish);
    }
}
