use std::sync::Arc;
use std::time::Instant;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::PhysicalKey,
    window::Window,
};

use simple_jump::{
    config::{AssetConfig, GameConfig},
    controller::{input::native, GameLoop, InputEvent, InputProcessor, InputState, RapierWorld},
    error::GameError,
    logging, setup_game,
    ui::{DebugOverlay, OverlayStats},
    view::{shader::FsAssets, GpuContext, WgpuRenderer},
};

struct App {
    window: Arc<Window>,
    game: GameLoop<RapierWorld>,
    renderer: WgpuRenderer,

    input_state: InputState,
    input_processor: InputProcessor,

    // egui
    overlay: DebugOverlay,
    egui_state: egui_winit::State,

    started: Instant,
}

impl App {
    async fn new(window: Arc<Window>, config: &GameConfig) -> Result<Self, GameError> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;
        let (game, renderer) = setup_game(gpu, config, &FsAssets, 0.0).await?;
        // the loop clock starts at 0 ms once setup is done
        let started = Instant::now();

        let overlay = DebugOverlay::new();
        let egui_state = egui_winit::State::new(
            overlay.context().clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );
        let input_processor = game.state().input_processor().clone();

        Ok(Self {
            window,
            game,
            renderer,
            input_state: InputState::new(),
            input_processor,
            overlay,
            egui_state,
            started,
        })
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn input(&mut self, event: &WindowEvent) {
        if self.input_state.show_overlay {
            let _ = self.egui_state.on_window_event(self.window.as_ref(), event);
        }

        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent { state, physical_key: PhysicalKey::Code(code), repeat, .. },
                ..
            } => {
                let Some(input) = native::key_to_input(*code, *state) else {
                    return;
                };
                if let InputEvent::KeyDown(key) = &input {
                    if self.input_processor.is_escape(key) {
                        tracing::info!("escape pressed, stopping");
                        self.game.stop();
                    } else if self.input_processor.wants_to_toggle_overlay(key) && !repeat {
                        self.input_state.toggle_overlay();
                    }
                }
                self.input_state.process_event(&input);
            }
            WindowEvent::Focused(false) => {
                self.input_state.process_event(&InputEvent::FocusLost);
            }
            WindowEvent::Occluded(occluded) => {
                self.input_state
                    .process_event(&InputEvent::VisibilityChanged { visible: !occluded });
            }
            _ => {}
        }
    }

    /// Step and draw one frame; false once the loop has stopped
    fn redraw(&mut self) -> Result<bool, GameError> {
        if self.input_state.show_overlay {
            let raw_input = self.egui_state.take_egui_input(self.window.as_ref());
            let stats = OverlayStats::collect(&self.game, &self.input_state);
            self.renderer.set_overlay(self.overlay.run(raw_input, &stats));
        }
        let now = self.now_ms();
        self.game.frame(now, &self.input_state, &mut self.renderer)
    }
}

#[allow(deprecated)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = GameConfig {
        assets: AssetConfig::from_env(),
        ..Default::default()
    };

    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Simple Jump")
        .with_inner_size(winit::dpi::PhysicalSize::new(config.view.width, config.view.height));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window, &config)).inspect_err(|e| tracing::error!("{e}"))?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
            app.input(event);
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(physical_size) => {
                    app.renderer.resize(physical_size.width, physical_size.height);
                }
                WindowEvent::RedrawRequested => match app.redraw() {
                    Ok(true) => {}
                    Ok(false) => elwt.exit(),
                    Err(e) => {
                        tracing::error!("{e}");
                        elwt.exit();
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            app.window.request_redraw();
        }
        _ => {}
    })?;

    Ok(())
}
