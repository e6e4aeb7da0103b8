use crate::interop::{self, from_js, to_js};
use crate::{error, Editor, FetchToken};
use boxgraph::{
    BoxEntity, Dictionary, DictionaryLink, EditorConfig, LiveEvent, Link, Pin, PinRect, SaveRequest,
    SchemaState,
};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

macro_rules! parse_or_return {
    ($v:expr, $ty:ty, $param:literal) => {
        match from_js::<$ty>($v) {
            Ok(x) => x,
            Err(e) => return error::invalid_input($param, e),
        }
    };
}

#[wasm_bindgen]
impl FetchToken {
    pub fn schema(&self) -> String {
        self.inner.schema().to_string()
    }
    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }
    pub fn abort(&self) {
        self.inner.abort()
    }
    pub fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }
}

#[wasm_bindgen]
impl Editor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Editor {
        Editor::rs_new(EditorConfig::default())
    }

    /// Builds an editor from a JSON config; omitted fields keep their defaults.
    pub fn with_config(json: &str) -> Result<Editor, JsValue> {
        EditorConfig::from_json(json)
            .map(Editor::rs_new)
            .map_err(|e| error::editor_error(&e))
    }

    pub fn version(&self) -> u64 {
        self.inner.store().version()
    }
    pub fn links_version(&self) -> u64 {
        self.inner.store().links_version()
    }
    pub fn geometry_version(&self) -> u64 {
        self.inner.geometry().version()
    }

    // Read side
    pub fn get_boxes(&self) -> JsValue {
        to_js(self.inner.store().boxes())
    }
    pub fn get_box(&self, name: &str) -> JsValue {
        self.inner.store().get_box(name).map(to_js).unwrap_or(JsValue::NULL)
    }
    pub fn get_links(&self) -> JsValue {
        to_js(self.inner.links())
    }
    pub fn get_dictionaries(&self) -> JsValue {
        to_js(self.inner.store().dictionaries())
    }
    pub fn get_dictionary_links(&self) -> JsValue {
        to_js(self.inner.store().dictionary_links())
    }
    pub fn get_pending(&self) -> JsValue {
        to_js(self.inner.store().pending())
    }
    pub fn get_history(&self) -> JsValue {
        to_js(self.inner.store().history().snapshots())
    }
    pub fn resources_res(&self) -> JsValue {
        error::result(self.inner.resources())
    }

    // Mutations
    pub fn create_box_res(&mut self, b: JsValue) -> JsValue {
        let b = parse_or_return!(b, BoxEntity, "box");
        error::result(self.inner.create_box(b))
    }
    pub fn delete_box_res(&mut self, name: &str) -> JsValue {
        error::result(self.inner.delete_box(name))
    }
    pub fn configure_box_res(&mut self, name: &str, b: JsValue) -> JsValue {
        let b = parse_or_return!(b, BoxEntity, "box");
        error::result(self.inner.configure_box(name, b))
    }
    pub fn configure_box_config_res(&mut self, name: &str, text: &str) -> JsValue {
        error::result(self.inner.configure_box_config(name, text))
    }
    pub fn configure_pin_res(&mut self, box_name: &str, pin: JsValue) -> JsValue {
        let pin = parse_or_return!(pin, Pin, "pin");
        error::result(self.inner.configure_pin(box_name, pin))
    }
    pub fn remove_pin_res(&mut self, box_name: &str, pin: &str) -> JsValue {
        error::result(self.inner.remove_pin(box_name, pin))
    }
    pub fn create_dictionary_res(&mut self, d: JsValue) -> JsValue {
        let d = parse_or_return!(d, Dictionary, "dictionary");
        error::result(self.inner.create_dictionary(d))
    }
    pub fn delete_dictionary_res(&mut self, name: &str) -> JsValue {
        error::result(self.inner.delete_dictionary(name))
    }
    pub fn configure_dictionary_res(&mut self, name: &str, d: JsValue) -> JsValue {
        let d = parse_or_return!(d, Dictionary, "dictionary");
        error::result(self.inner.configure_dictionary(name, d))
    }
    pub fn add_link_res(&mut self, link: JsValue) -> JsValue {
        let link = parse_or_return!(link, Link, "link");
        error::result(self.inner.add_link(link))
    }
    pub fn delete_link_res(&mut self, name: &str) -> JsValue {
        error::result(self.inner.delete_link(name))
    }
    pub fn change_link_res(&mut self, name: &str, link: JsValue) -> JsValue {
        let link = parse_or_return!(link, Link, "link");
        error::result(self.inner.change_link(name, link))
    }
    pub fn add_dictionary_link_res(&mut self, link: JsValue) -> JsValue {
        let link = parse_or_return!(link, DictionaryLink, "link");
        error::result(self.inner.add_dictionary_link(link))
    }
    pub fn delete_dictionary_link_res(&mut self, name: &str) -> JsValue {
        error::result(self.inner.delete_dictionary_link(name))
    }

    // History
    pub fn can_undo(&self) -> bool {
        self.inner.store().can_undo()
    }
    pub fn can_redo(&self) -> bool {
        self.inner.store().can_redo()
    }
    pub fn undo(&mut self) -> bool {
        self.inner.undo()
    }
    pub fn redo(&mut self) -> bool {
        self.inner.redo()
    }

    // Layout; setters return true when pins must be re-measured
    pub fn set_scroll(&mut self, left: f32, top: f32) -> bool {
        self.inner.set_scroll(left, top)
    }
    pub fn set_viewport(&mut self, width: f32, height: f32) -> bool {
        self.inner.set_viewport(width, height)
    }
    pub fn toggle_pin_expanded(&mut self, box_name: &str, pin: &str) -> bool {
        self.inner.toggle_pin_expanded(box_name, pin)
    }
    pub fn set_active_box(&mut self, box_name: Option<String>, pin: Option<String>) -> bool {
        self.inner.set_active_box(box_name.as_deref(), pin.as_deref())
    }
    pub fn set_expanded_box(&mut self, box_name: Option<String>) -> bool {
        self.inner.set_expanded_box(box_name.as_deref())
    }
    #[allow(clippy::too_many_arguments)]
    pub fn record_pin_rect_res(
        &mut self,
        box_name: &str,
        pin: &str,
        link: &str,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> JsValue {
        for (name, v) in [("left", left), ("top", top), ("width", width), ("height", height)] {
            if !v.is_finite() {
                return error::non_finite(name);
            }
        }
        self.inner
            .record_pin_rect(box_name, pin, link, PinRect { left, top, width, height });
        error::ok(JsValue::NULL)
    }
    pub fn get_arrows(&self) -> JsValue {
        to_js(&self.inner.arrows())
    }
    pub fn get_arrow_arrays(&self) -> JsValue {
        interop::arrow_arrays(&self.inner.arrows())
    }

    // Drag-to-link
    pub fn begin_link_drag_res(&mut self, box_name: &str, pin: Option<String>) -> JsValue {
        match self.inner.begin_link_drag(box_name, pin.as_deref()) {
            Ok(c) => error::ok(interop::strings(&c).into()),
            Err(e) => error::editor_error(&e),
        }
    }
    pub fn connectable_boxes(&self) -> js_sys::Array {
        interop::strings(self.inner.connectable_boxes())
    }
    pub fn complete_link_drag_res(&mut self, target_box: &str, target_pin: &str, name: Option<String>) -> JsValue {
        error::result(self.inner.complete_link_drag(target_box, target_pin, name.as_deref()))
    }
    pub fn cancel_link_drag(&mut self) {
        self.inner.cancel_link_drag()
    }

    // Remote state
    pub fn set_schemas_res(&mut self, schemas: JsValue) -> JsValue {
        let schemas = parse_or_return!(schemas, Vec<String>, "schemas");
        self.inner.set_schemas(schemas);
        error::ok(JsValue::NULL)
    }
    pub fn select_schema(&mut self, name: &str) -> Result<FetchToken, JsValue> {
        self.inner
            .select_schema(name)
            .map(|inner| FetchToken { inner })
            .map_err(|e| error::editor_error(&e))
    }
    pub fn begin_refetch(&mut self) -> Option<FetchToken> {
        self.inner.begin_refetch().map(|inner| FetchToken { inner })
    }
    pub fn accept_state_res(&mut self, token: &FetchToken, state: JsValue) -> JsValue {
        let state = parse_or_return!(state, SchemaState, "state");
        match self.inner.accept_state(&token.inner, &state) {
            Some(report) => error::ok(to_js(&report)),
            None => error::stale_fetch(token.inner.schema()),
        }
    }
    pub fn fetch_failed(&mut self, code: &str, message: &str) {
        self.inner.fetch_failed(code, message)
    }
    pub fn handle_live_event_res(&mut self, event: JsValue) -> JsValue {
        let event = parse_or_return!(event, LiveEvent, "event");
        error::ok(to_js(&self.inner.handle_live_event(&event)))
    }
    pub fn get_statuses(&self) -> JsValue {
        to_js(self.inner.statuses().statuses())
    }

    // Save lifecycle
    pub fn begin_save(&self) -> JsValue {
        self.inner.begin_save().map(|r| to_js(&r)).unwrap_or(JsValue::NULL)
    }
    pub fn save_succeeded_res(&mut self, request: JsValue) -> JsValue {
        let request = parse_or_return!(request, SaveRequest, "request");
        self.inner.save_succeeded(&request);
        error::ok(JsValue::from_f64(self.inner.store().pending().len() as f64))
    }
    pub fn save_failed(&mut self, code: &str, message: &str) {
        self.inner.save_failed(code, message)
    }

    // Notifications
    pub fn get_notifications(&self) -> JsValue {
        to_js(self.inner.notifications().entries())
    }
    pub fn dismiss_notification(&mut self, key: &str) -> bool {
        self.inner.notifications_mut().dismiss(key)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new()
    }
}
