pub mod config;
pub mod error;
pub mod logging;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

use config::GameConfig;
use controller::{GameLoop, GameState, InputProcessor, RapierWorld};
use error::GameError;
use model::{Camera, SceneLayout};
use view::{build_program, AssetSource, GpuContext, WgpuRenderer};

/// Host-independent part of startup: shader program, renderer, bodies, loop.
///
/// Completes before the first frame is drawn.
pub async fn setup_game<A: AssetSource>(
    gpu: GpuContext,
    config: &GameConfig,
    assets: &A,
    now_ms: f64,
) -> Result<(GameLoop<RapierWorld>, WgpuRenderer), GameError> {
    let program = build_program(
        assets,
        &config.assets.shader_dir,
        &config.assets.vertex_shader,
        &config.assets.fragment_shader,
    )
    .await?;
    let renderer = WgpuRenderer::new(gpu, &program, config.view.clear_color);

    let camera = Camera::new(config.view.width, config.view.height);
    let state = GameState::new(
        SceneLayout::default(),
        RapierWorld::new(config.physics.gravity),
        config.physics.clone(),
        InputProcessor::default(),
        &camera,
    );
    tracing::info!(bodies = state.world.body_count(), "scene ready");

    Ok((GameLoop::new(state, config.palette, now_ms), renderer))
}

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, Window};

    use super::*;
    use crate::controller::input::wasm::keyboard_event_to_input;
    use crate::controller::{InputEvent, InputState};
    use crate::ui::{DebugOverlay, OverlayStats};
    use crate::view::shader::HttpAssets;

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let config = GameConfig::default();

        let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
        let document = window.document().ok_or_else(|| js_error("no document on window"))?;

        let Some(canvas) = find_canvas(&document, &config.view.canvas_id) else {
            tracing::warn!(id = %config.view.canvas_id, "canvas not found, not starting");
            return Ok(());
        };
        canvas.set_width(config.view.width);
        canvas.set_height(config.view.height);

        let gpu = match GpuContext::new(&canvas, config.view.width, config.view.height).await {
            Ok(gpu) => gpu,
            Err(e @ GameError::SurfaceUnavailable(_)) => {
                tracing::error!("{e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let (mut game, mut renderer) =
            setup_game(gpu, &config, &HttpAssets, performance_now(&window)).await?;

        let input_state = Rc::new(RefCell::new(InputState::new()));
        setup_input_listeners(&window, &document, input_state.clone(), game.state().input_processor().clone())?;

        let (width, height) = (config.view.width, config.view.height);
        let overlay = DebugOverlay::new();

        RafLoop::new(window, move |now_ms| {
            let input = input_state.borrow();
            if input.show_overlay {
                let stats = OverlayStats::collect(&game, &input);
                renderer.set_overlay(overlay.run(DebugOverlay::raw_input(width, height, now_ms), &stats));
            }
            match game.frame(now_ms, &*input, &mut renderer) {
                Ok(keep_going) => keep_going,
                Err(e) => {
                    tracing::error!("{e}");
                    false
                }
            }
        })
        .start()?;

        tracing::info!("frame loop started");
        Ok(())
    }

    fn find_canvas(document: &Document, id: &str) -> Option<HtmlCanvasElement> {
        document.get_element_by_id(id)?.dyn_into::<HtmlCanvasElement>().ok()
    }

    fn performance_now(window: &Window) -> f64 {
        window.performance().map(|p| p.now()).unwrap_or(0.0)
    }

    /// Keyboard, blur and visibility listeners feeding the shared key state
    fn setup_input_listeners(
        window: &Window,
        document: &Document,
        input_state: Rc<RefCell<InputState>>,
        input_processor: InputProcessor,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let input_state = input_state.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let key = e.key();
                if input_processor.wants_to_toggle_overlay(&key) {
                    if !e.repeat() {
                        input_state.borrow_mut().toggle_overlay();
                    }
                    e.prevent_default();
                    return;
                }
                // keep arrows and space from scrolling the page
                if input_processor.is_game_key(&key) {
                    e.prevent_default();
                }
                input_state.borrow_mut().process_event(&keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let input_state = input_state.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                input_state.borrow_mut().process_event(&keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let input_state = input_state.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                input_state.borrow_mut().process_event(&InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Visibility change - clear all keys
        {
            let doc = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                let visible = !doc.hidden();
                input_state.borrow_mut().process_event(&InputEvent::VisibilityChanged { visible });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        Ok(())
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    /// requestAnimationFrame driver; reschedules only while the callback returns true
    struct RafLoop {
        inner: Box<dyn FnMut(f64) -> bool>,
        window: Window,
    }

    impl RafLoop {
        fn new(window: Window, f: impl FnMut(f64) -> bool + 'static) -> Self {
            Self { inner: Box::new(f), window }
        }

        fn start(self) -> Result<(), JsValue> {
            let RafLoop { mut inner, window } = self;

            // the closure holds a handle to itself, which keeps it alive
            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut(f64)>>));
            let callback_clone = callback.clone();
            let window_for_loop = window.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |now_ms: f64| {
                if !inner(now_ms) {
                    tracing::info!("frame loop stopped");
                    return;
                }
                if let Some(cb) = callback_clone.borrow().as_ref() {
                    if let Err(e) = window_for_loop.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        tracing::error!(?e, "requestAnimationFrame failed");
                    }
                }
            }) as Box<dyn FnMut(f64)>));

            if let Some(cb) = callback.borrow().as_ref() {
                window.request_animation_frame(cb.as_ref().unchecked_ref())?;
            }
            Ok(())
        }
    }
}
