use wasm_bindgen::prelude::*;
mod api;
mod error;
mod interop;
mod logging;

pub use api::set_panic_hook;
pub use logging::init_logging;

#[wasm_bindgen]
pub struct Editor { pub(crate) inner: boxgraph::Editor }

/// Handle for one schema-state fetch. Pass it back to `accept_state_res`
/// together with the response; wire `abort` to the request's abort controller.
#[wasm_bindgen]
pub struct FetchToken { pub(crate) inner: boxgraph::FetchHandle }

impl Editor {
    pub fn rs_new(config: boxgraph::EditorConfig) -> Editor { Editor { inner: boxgraph::Editor::new(config) } }
}
