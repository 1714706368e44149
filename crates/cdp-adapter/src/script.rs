//! Script builders for DOM access through `Runtime.evaluate`.
//!
//! Scripts run in whichever execution context is active (the page, or an isolated world
//! inside the current frame) and answer with a `{ status, ... }` object.

use serde_json::Value;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::session::ElementHandle;

fn literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AdapterError> {
    serde_json::to_string(value).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("invalid script literal: {}", err))
    })
}

pub(crate) fn count(selector: &str) -> Result<String, AdapterError> {
    Ok(format!(
        "(() => {{ return {{ status: 'ok', count: document.querySelectorAll({sel}).length }}; }})()",
        sel = literal(selector)?,
    ))
}

/// Wraps `body` so it runs with `el` bound to the handle's element.
pub(crate) fn with_element(element: &ElementHandle, body: &str) -> Result<String, AdapterError> {
    Ok(format!(
        "(() => {{ const el = document.querySelectorAll({sel})[{idx}]; if (!el) {{ return {{ status: 'missing' }}; }} {body} }})()",
        sel = literal(&element.selector)?,
        idx = element.index,
        body = body,
    ))
}

/// Evaluates to the element itself (or `null`), for callers that need a remote object.
pub(crate) fn element_ref(element: &ElementHandle) -> Result<String, AdapterError> {
    Ok(format!(
        "document.querySelectorAll({sel})[{idx}] ?? null",
        sel = literal(&element.selector)?,
        idx = element.index,
    ))
}

// Clicks and submits are deferred so that a dialog they raise cannot block the evaluation.
pub(crate) const CLICK: &str = "setTimeout(() => el.click(), 0); return { status: 'ok' };";

pub(crate) const SUBMIT: &str = "if ((el.tagName || '').toLowerCase() !== 'form') { return { status: 'wrong-tag' }; } setTimeout(() => HTMLFormElement.prototype.submit.call(el), 0); return { status: 'ok' };";

pub(crate) const TEXT: &str =
    "const raw = el.innerText ?? el.textContent ?? ''; return { status: 'ok', value: String(raw).trim() };";

pub(crate) const OPTION_LABELS: &str = "const opts = Array.from(el.options || []); return { status: 'ok', value: opts.map(o => String(o.text ?? '').trim()) };";

pub(crate) fn type_text(text: &str) -> Result<String, AdapterError> {
    Ok(format!(
        "const text = {text}; el.focus(); el.value = (el.value || '') + text; for (const kind of ['input', 'keyup', 'change']) {{ el.dispatchEvent(new Event(kind, {{ bubbles: true }})); }} el.blur(); return {{ status: 'ok' }};",
        text = literal(text)?,
    ))
}

pub(crate) fn select_by_text(visible_text: &str) -> Result<String, AdapterError> {
    Ok(format!(
        "const target = {target}; const opts = Array.from(el.options || []); const opt = opts.find(o => String(o.text ?? '').trim() === target); if (!opt) {{ return {{ status: 'option-missing' }}; }} el.value = opt.value; opt.selected = true; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return {{ status: 'ok' }};",
        target = literal(visible_text.trim())?,
    ))
}

/// Maps the `status` field of a script answer onto adapter errors.
pub(crate) fn check_status(value: &Value, element: &ElementHandle) -> Result<(), AdapterError> {
    match value.get("status").and_then(Value::as_str).unwrap_or("unknown") {
        "ok" => Ok(()),
        "missing" => Err(AdapterError::not_found(&element.selector)),
        "option-missing" => Err(AdapterError::new(AdapterErrorKind::OptionNotFound)
            .with_hint(format!("no matching option in '{}'", element.selector))),
        "wrong-tag" => Err(AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("'{}' has an unexpected element type", element.selector))),
        other => Err(AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("unexpected script status: {}", other))),
    }
}
