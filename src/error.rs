use crate::interop::{new_obj, set_kv, to_js};
use boxgraph::EditorError;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub fn ok(v: JsValue) -> JsValue {
    let o = new_obj();
    set_kv(&o, "ok", &JsValue::from_bool(true));
    set_kv(&o, "value", &v);
    o.into()
}

pub fn err(code: &'static str, message: impl Into<String>, data: Option<JsValue>) -> JsValue {
    let root = new_obj();
    set_kv(&root, "ok", &JsValue::from_bool(false));
    let e = new_obj();
    set_kv(&e, "code", &JsValue::from_str(code));
    set_kv(&e, "message", &JsValue::from_str(&message.into()));
    if let Some(d) = data { set_kv(&e, "data", &d); }
    set_kv(&root, "error", &e.into());
    root.into()
}

pub fn editor_error(e: &EditorError) -> JsValue {
    let d = new_obj();
    match e {
        EditorError::DuplicateName { kind, name } | EditorError::NotFound { kind, name } => {
            set_kv(&d, "kind", &JsValue::from_str(kind.as_str()));
            set_kv(&d, "name", &JsValue::from_str(name));
        }
        EditorError::PinNotFound { box_name, pin } => {
            set_kv(&d, "box", &JsValue::from_str(box_name));
            set_kv(&d, "pin", &JsValue::from_str(pin));
        }
        EditorError::IncompatiblePins { from, to } => {
            set_kv(&d, "from", &JsValue::from_str(from));
            set_kv(&d, "to", &JsValue::from_str(to));
        }
        EditorError::Network { code, .. } => set_kv(&d, "status", &JsValue::from_str(code)),
        EditorError::InvalidConnectionType(got) => set_kv(&d, "got", &JsValue::from_str(got)),
        EditorError::UnknownSchema(name) => set_kv(&d, "name", &JsValue::from_str(name)),
        _ => {}
    }
    err(e.code(), e.to_string(), Some(d.into()))
}

/// `ok(value)` on success, the typed error object otherwise.
pub fn result<T: Serialize>(r: boxgraph::Result<T>) -> JsValue {
    match r {
        Ok(v) => ok(to_js(&v)),
        Err(e) => editor_error(&e),
    }
}

#[inline]
pub fn invalid_input(param: &str, message: String) -> JsValue {
    let d = new_obj();
    set_kv(&d, "param", &JsValue::from_str(param));
    err("invalid_document", format!("parameter '{}': {}", param, message), Some(d.into()))
}

#[inline]
pub fn non_finite(param: &str) -> JsValue {
    let d = new_obj();
    set_kv(&d, "param", &JsValue::from_str(param));
    err("non_finite", format!("parameter '{}' must be finite", param), Some(d.into()))
}

#[inline]
pub fn stale_fetch(schema: &str) -> JsValue {
    let d = new_obj();
    set_kv(&d, "schema", &JsValue::from_str(schema));
    err("stale_fetch", "fetch was aborted or superseded", Some(d.into()))
}
