//! wasm-bindgen facade: JS owns an `ArViewer` and drives it from its
//! animation-frame loop, key handlers and the "next" button.

use crate::clock::FrameClock;
use crate::config::ViewerConfig;
use crate::controller::{AnimationController, PlayOutcome};
use crate::input::slot_for_key;
use crate::loader::{AssetLoader, FetchLoader};
use crate::mixer::Mixer;
use futures::future::LocalFutureObj;
use futures::task::{LocalSpawn, SpawnError};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// Runs preload tasks on the browser microtask queue
struct BrowserSpawner;

impl LocalSpawn for BrowserSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

struct ViewerState {
    controller: AnimationController<Mixer>,
    clock: FrameClock,
}

#[wasm_bindgen]
pub struct ArViewer {
    state: Rc<RefCell<ViewerState>>,
    config: ViewerConfig,
    loader: Rc<FetchLoader>,
}

fn to_js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
impl ArViewer {
    /// Create a viewer from a config object; `undefined` uses the defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<ArViewer, JsValue> {
        // Set up panic hook for better error messages in browser console
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).ok();

        let config: ViewerConfig = if config.is_undefined() || config.is_null() {
            ViewerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };
        config.validate().map_err(to_js_err)?;

        let state = ViewerState {
            controller: AnimationController::new(Mixer::new(), &config),
            clock: FrameClock::new(),
        };

        Ok(ArViewer {
            state: Rc::new(RefCell::new(state)),
            loader: Rc::new(FetchLoader::new(config.asset_path.clone())),
            config,
        })
    }

    /// Load the base clip, then preload the rest in the background.
    /// Rejects if the base clip cannot be loaded.
    pub fn start(&self) -> js_sys::Promise {
        let state = Rc::clone(&self.state);
        let loader = Rc::clone(&self.loader);
        let config = self.config.clone();

        future_to_promise(async move {
            let asset = loader.load(&config.base_clip).await.map_err(to_js_err)?;

            let mut state = state.borrow_mut();
            state
                .controller
                .install_base(&config.base_clip, asset)
                .map_err(to_js_err)?;
            state
                .controller
                .preload(&config.preload_clips(), loader, &BrowserSpawner);

            Ok(JsValue::UNDEFINED)
        })
    }

    /// Cross-fade to a clip by name. Returns false if nothing changed.
    pub fn play(&self, name: &str) -> bool {
        let outcome = self.state.borrow_mut().controller.play_by_name(name);
        outcome == PlayOutcome::Played
    }

    /// Play the next clip in list order
    pub fn next(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let outcome = state.controller.advance_to_next();
        if let Some(name) = state.controller.current_clip_name() {
            log::info!("Next animation: {} ({:?})", name, outcome);
        }
        outcome == PlayOutcome::Played
    }

    /// Handle a key press; digits 1-8 pick a clip by position
    pub fn key(&self, key: &str) -> bool {
        let Some(slot) = slot_for_key(key) else {
            return false;
        };
        self.state.borrow_mut().controller.play_slot(slot) == PlayOutcome::Played
    }

    /// Per-frame update with the animation-frame timestamp in milliseconds
    pub fn tick(&self, timestamp_ms: f64) {
        let mut state = self.state.borrow_mut();
        let delta = state.clock.delta(timestamp_ms);
        state.controller.update(delta);
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().controller.is_ready()
    }

    #[wasm_bindgen(getter)]
    pub fn current_clip(&self) -> Option<String> {
        self.state
            .borrow()
            .controller
            .current_clip_name()
            .map(str::to_string)
    }

    /// Names of every clip loaded so far
    pub fn loaded_clips(&self) -> Vec<String> {
        let state = self.state.borrow();
        state
            .controller
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Blended pose of all running actions, as `{ trackName: value }`
    pub fn pose(&self) -> Result<JsValue, JsValue> {
        let pose = self.state.borrow().controller.engine().sample();
        // Plain object rather than a JS `Map`
        pose.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(to_js_err)
    }
}
