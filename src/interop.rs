use boxgraph::Arrow;
use js_sys::{Array, Float32Array, Object, Reflect, Uint8Array};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::JsValue;

pub fn new_obj() -> Object { Object::new() }

pub fn set_kv(obj: &Object, key: &str, val: &JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(key), val);
}

pub fn arr_f32(data: &[f32]) -> Float32Array { Float32Array::from(data) }
pub fn arr_u8(data: &[u8]) -> Uint8Array { Uint8Array::from(data) }

/// Plain JS objects and arrays, never `Map`s, so the host can JSON.stringify them.
pub fn to_js<T: Serialize + ?Sized>(v: &T) -> JsValue {
    v.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

pub fn from_js<T: DeserializeOwned>(v: JsValue) -> Result<T, String> {
    serde_wasm_bindgen::from_value(v).map_err(|e| e.to_string())
}

pub fn strings(items: &[String]) -> Array {
    items.iter().map(|s| JsValue::from_str(s)).collect()
}

/// `{ links: string[], coords: Float32Array, reversed: Uint8Array }` where
/// `coords` holds `[startX, startY, endX, endY]` per arrow.
pub fn arrow_arrays(arrows: &[Arrow]) -> JsValue {
    let mut names = Vec::with_capacity(arrows.len());
    let mut coords = Vec::with_capacity(arrows.len() * 4);
    let mut reversed = Vec::with_capacity(arrows.len());
    for a in arrows {
        names.push(a.link.clone());
        coords.extend_from_slice(&[a.start.left, a.start.top, a.end.left, a.end.top]);
        reversed.push(a.reversed as u8);
    }
    let o = new_obj();
    set_kv(&o, "links", &strings(&names).into());
    set_kv(&o, "coords", &arr_f32(&coords).into());
    set_kv(&o, "reversed", &arr_u8(&reversed).into());
    o.into()
}
