#![cfg(target_arch = "wasm32")]

use boxgraph_wasm::Editor;
use js_sys::{Array, Float32Array, Reflect};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn is_ok(v: &JsValue) -> bool {
    Reflect::get(v, &JsValue::from_str("ok"))
        .ok()
        .and_then(|x| x.as_bool())
        .unwrap_or(false)
}

fn is_err(v: &JsValue, code: &str) -> bool {
    if is_ok(v) {
        return false;
    }
    Reflect::get(v, &JsValue::from_str("error"))
        .and_then(|e| Reflect::get(&e, &JsValue::from_str("code")))
        .ok()
        .and_then(|c| c.as_string())
        .map_or(false, |s| s == code)
}

fn js(text: &str) -> JsValue {
    js_sys::JSON::parse(text).unwrap()
}

fn editor() -> Editor {
    let mut ed = Editor::with_config(r#"{ "groups": [ { "title": "G1", "types": ["K1"] }, { "title": "G2", "types": ["K2"] } ] }"#)
        .unwrap_or_else(|_| panic!("config"));
    let a = ed.create_box_res(js(r#"{ "name": "svc-a", "spec": { "type": "K1", "pins": [ { "name": "out", "connection-type": "mq" } ] } }"#));
    assert!(is_ok(&a));
    let b = ed.create_box_res(js(r#"{ "name": "svc-b", "spec": { "type": "K2", "pins": [ { "name": "in", "connection-type": "mq" } ] } }"#));
    assert!(is_ok(&b));
    ed
}

fn link_count(ed: &Editor) -> u32 {
    Array::from(&ed.get_links()).length()
}

#[wasm_bindgen_test]
fn drag_link_then_undo_redo() {
    let mut ed = editor();
    let c = ed.begin_link_drag_res("svc-a", Some("out".into()));
    assert!(is_ok(&c));
    let r = ed.complete_link_drag_res("svc-b", "in", None);
    assert!(is_ok(&r));
    assert_eq!(link_count(&ed), 1);
    let link = Array::from(&ed.get_links()).get(0);
    let name = Reflect::get(&link, &JsValue::from_str("name")).unwrap();
    assert_eq!(name.as_string().as_deref(), Some("svc-a-to-svc-b"));

    assert!(ed.undo());
    assert_eq!(link_count(&ed), 0);
    assert!(ed.redo());
    assert_eq!(link_count(&ed), 1);
}

#[wasm_bindgen_test]
fn validation_errors_are_typed_and_leave_state() {
    let mut ed = editor();
    let ver = ed.version();
    let dup = ed.create_box_res(js(r#"{ "name": "svc-a", "spec": { "type": "K1" } }"#));
    assert!(is_err(&dup, "duplicate_name"));
    let bad = ed.configure_pin_res("svc-a", js(r#"{ "name": "x", "connection-type": "amqp" }"#));
    assert!(is_err(&bad, "invalid_connection_type"));
    let cfg = ed.configure_box_config_res("svc-a", "{ nope");
    assert!(is_err(&cfg, "malformed_config"));
    let shape = ed.add_link_res(js(r#"{ "name": 3 }"#));
    assert!(is_err(&shape, "invalid_document"));
    assert_eq!(ed.version(), ver, "state mutated on error");
}

#[wasm_bindgen_test]
fn arrows_as_typed_arrays() {
    let mut ed = editor();
    ed.begin_link_drag_res("svc-a", Some("out".into()));
    assert!(is_ok(&ed.complete_link_drag_res("svc-b", "in", Some("l".into()))));
    assert!(is_ok(&ed.record_pin_rect_res("svc-a", "out", "l", 0.0, 0.0, 10.0, 10.0)));
    assert!(is_err(&ed.record_pin_rect_res("svc-b", "in", "l", f32::NAN, 0.0, 10.0, 10.0), "non_finite"));
    assert!(is_ok(&ed.record_pin_rect_res("svc-b", "in", "l", 50.0, 20.0, 10.0, 10.0)));
    let arrays = ed.get_arrow_arrays();
    let coords = Float32Array::from(Reflect::get(&arrays, &JsValue::from_str("coords")).unwrap());
    assert_eq!(coords.to_vec(), vec![10.0, 5.0, 50.0, 25.0]);
}

#[wasm_bindgen_test]
fn stale_fetch_is_rejected() {
    let mut ed = Editor::new();
    let first = ed.select_schema("a").unwrap_or_else(|_| panic!("select"));
    let second = ed.select_schema("b").unwrap_or_else(|_| panic!("select"));
    assert!(first.is_aborted());
    let state = js(r#"{ "resources": [ { "kind": "box", "name": "x", "body": { "name": "x", "spec": { "type": "K" } } } ] }"#);
    assert!(is_err(&ed.accept_state_res(&first, state.clone()), "stale_fetch"));
    assert!(is_ok(&ed.accept_state_res(&second, state)));
    assert_eq!(Array::from(&ed.get_boxes()).length(), 1);
    assert!(!ed.can_undo());
}
