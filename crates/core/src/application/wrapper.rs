// Script Wrapper
//
// Injected code has no console of its own, so every exit path of the wrapped
// body must ship a marker over the message channel: boot on entry, finished +
// exports on fall-through, fatal (then rethrow) on a top-level throw.

use chrono::{DateTime, SecondsFormat, Utc};

/// Default export probed by the wrapper
pub const DEFAULT_EXPORT_NAME: &str = "decrypt";

/// Wraps an opaque script body in the diagnostic boundary
#[derive(Debug, Clone)]
pub struct ScriptWrapper {
    export_name: String,
}

impl ScriptWrapper {
    pub fn new(export_name: impl Into<String>) -> Self {
        Self {
            export_name: export_name.into(),
        }
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    /// Produce the wrapped source
    ///
    /// `body` is inserted verbatim. The export name and boot timestamp are
    /// embedded as JSON string literals.
    pub fn wrap(&self, body: &str, booted_at: DateTime<Utc>) -> String {
        let time = js_string(&booted_at.to_rfc3339_opts(SecondsFormat::Millis, true));
        let export = js_string(&self.export_name);

        let prologue = format!(
            r#"(function () {{
  try {{
    send({{"stage": "boot", "time": {time}, "msg": "wrapper entered"}});

"#
        );

        let epilogue = format!(
            r#"

    send({{"stage": "finished", "msg": "top-level body completed"}});

    try {{
      var exportTable = (typeof rpc !== "undefined" && rpc.exports) ? rpc.exports : null;
      send({{
        "stage": "exports",
        "export": {export},
        "hasDecrypt": exportTable !== null && typeof exportTable[{export}] === "function",
        "exportKeys": exportTable !== null ? Object.keys(exportTable) : null
      }});
    }} catch (e) {{
      send({{"stage": "exports", "export": {export}, "error": String(e)}});
    }}
  }} catch (e) {{
    send({{"stage": "fatal", "error": String(e), "stack": (e && e.stack) ? String(e.stack) : null}});
    throw e;
  }}
}})();
"#
        );

        let mut wrapped = String::with_capacity(prologue.len() + body.len() + epilogue.len());
        wrapped.push_str(&prologue);
        wrapped.push_str(body);
        wrapped.push_str(&epilogue);
        wrapped
    }
}

impl Default for ScriptWrapper {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_NAME)
    }
}

/// JSON string literals are valid JavaScript string literals
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Context, Source};
    use chrono::TimeZone;
    use serde_json::Value;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    const BODY: &str = "rpc.exports = { decrypt: function (p) { return p; } };\n// trailing comment";

    #[test]
    fn test_body_inserted_verbatim() {
        let wrapped = ScriptWrapper::default().wrap(BODY, fixed_time());
        assert!(wrapped.contains(BODY));
        assert_eq!(wrapped.matches(BODY).count(), 1);
    }

    #[test]
    fn test_marker_order() {
        let wrapped = ScriptWrapper::default().wrap(BODY, fixed_time());

        let boot = wrapped.find(r#""stage": "boot""#).unwrap();
        let body = wrapped.find(BODY).unwrap();
        let finished = wrapped.find(r#""stage": "finished""#).unwrap();
        let exports = wrapped.find(r#""stage": "exports""#).unwrap();
        let fatal = wrapped.find(r#""stage": "fatal""#).unwrap();

        assert!(boot < body);
        assert!(body < finished);
        assert!(finished < exports);
        assert!(exports < fatal);
    }

    #[test]
    fn test_trailing_line_comment_does_not_swallow_epilogue() {
        let wrapped = ScriptWrapper::default().wrap(BODY, fixed_time());
        let after_body = &wrapped[wrapped.find(BODY).unwrap() + BODY.len()..];
        assert!(after_body.starts_with('\n'));
    }

    #[test]
    fn test_fatal_path_rethrows() {
        let wrapped = ScriptWrapper::default().wrap("throw new Error('x');", fixed_time());
        let fatal = wrapped.find(r#""stage": "fatal""#).unwrap();
        let rethrow = wrapped.rfind("throw e;").unwrap();
        assert!(fatal < rethrow);
    }

    #[test]
    fn test_boot_timestamp_embedded() {
        let wrapped = ScriptWrapper::default().wrap("", fixed_time());
        assert!(wrapped.contains(r#""time": "2026-10-18T09:30:00.000Z""#));
    }

    #[test]
    fn test_export_name_is_escaped() {
        let wrapper = ScriptWrapper::new(r#"dec"rypt"#);
        let wrapped = wrapper.wrap("", fixed_time());
        assert!(wrapped.contains(r#""export": "dec\"rypt""#));
        assert!(wrapped.contains(r#"typeof exportTable["dec\"rypt"] === "function""#));
    }

    #[test]
    fn test_export_check_has_own_catch() {
        let wrapped = ScriptWrapper::default().wrap("", fixed_time());
        assert!(wrapped.contains(r#"send({"stage": "exports", "export": "decrypt", "error": String(e)});"#));
    }

    #[test]
    fn test_exports_flag_field_name() {
        let wrapped = ScriptWrapper::new("decode").wrap("", fixed_time());
        assert!(wrapped.contains(r#""hasDecrypt": exportTable !== null"#));
        assert!(!wrapped.contains("hasExport"));
    }

    /// Evaluate the wrapped source with a recording `send`
    ///
    /// Returns the sent payloads in order and whether evaluation threw.
    fn execute(prelude: &str, wrapped: &str) -> (Vec<Value>, bool) {
        let mut ctx = Context::default();
        ctx.eval(Source::from_bytes(
            "var __sent = []; function send(m) { __sent.push(m); }",
        ))
        .unwrap();
        ctx.eval(Source::from_bytes(prelude)).unwrap();

        let threw = ctx.eval(Source::from_bytes(wrapped)).is_err();

        let sent = ctx
            .eval(Source::from_bytes("JSON.stringify(__sent)"))
            .unwrap()
            .to_string(&mut ctx)
            .unwrap()
            .to_std_string_escaped();
        (serde_json::from_str(&sent).unwrap(), threw)
    }

    fn stages(sent: &[Value]) -> Vec<&str> {
        sent.iter().map(|m| m["stage"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_executed_healthy_body() {
        let wrapped = ScriptWrapper::default().wrap(BODY, fixed_time());
        let (sent, threw) = execute("var rpc = {};", &wrapped);

        assert!(!threw);
        assert_eq!(stages(&sent), vec!["boot", "finished", "exports"]);
        assert_eq!(sent[0]["time"], "2026-10-18T09:30:00.000Z");
        assert_eq!(sent[2]["export"], "decrypt");
        assert_eq!(sent[2]["hasDecrypt"], true);
        assert_eq!(sent[2]["exportKeys"], serde_json::json!(["decrypt"]));
    }

    #[test]
    fn test_executed_missing_export() {
        let wrapped = ScriptWrapper::default()
            .wrap("rpc.exports = { init: function () {} };", fixed_time());
        let (sent, threw) = execute("var rpc = {};", &wrapped);

        assert!(!threw);
        assert_eq!(sent[2]["hasDecrypt"], false);
        assert_eq!(sent[2]["exportKeys"], serde_json::json!(["init"]));
    }

    #[test]
    fn test_executed_custom_export_name() {
        let wrapped = ScriptWrapper::new("decode")
            .wrap("rpc.exports = { decode: function () {} };", fixed_time());
        let (sent, _) = execute("var rpc = {};", &wrapped);

        assert_eq!(sent[2]["export"], "decode");
        assert_eq!(sent[2]["hasDecrypt"], true);
    }

    #[test]
    fn test_executed_throwing_body() {
        let wrapped = ScriptWrapper::default().wrap("throw new Error('boom');", fixed_time());
        let (sent, threw) = execute("var rpc = {};", &wrapped);

        assert!(threw, "top-level error must be rethrown");
        assert_eq!(stages(&sent), vec!["boot", "fatal"]);
        assert!(sent[1]["error"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_executed_throwing_registry() {
        let prelude = r#"var rpc = {};
Object.defineProperty(rpc, "exports", { get: function () { throw new Error("registry locked"); } });"#;
        let wrapped = ScriptWrapper::default().wrap("", fixed_time());
        let (sent, threw) = execute(prelude, &wrapped);

        assert!(!threw);
        assert_eq!(stages(&sent), vec!["boot", "finished", "exports"]);
        assert!(sent[2]["error"].as_str().unwrap().contains("registry locked"));
        assert!(sent[2].get("hasDecrypt").is_none());
    }
}
