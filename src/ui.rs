use egui::Context;
use glam::Vec2;

use crate::controller::{GameLoop, InputState, PhysicsWorld};

/// What the debug window shows for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayStats {
    pub fps: f32,
    pub frames: u64,
    pub player_pos: Vec2,
    pub player_vel: Vec2,
    pub held_keys: Vec<String>,
}

impl OverlayStats {
    pub fn collect<W: PhysicsWorld>(game: &GameLoop<W>, input: &InputState) -> Self {
        let dt = game.last_dt();
        let state = game.state();
        let mut held_keys: Vec<String> = input.pressed_keys.iter().cloned().collect();
        held_keys.sort();
        Self {
            fps: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            frames: game.frames(),
            player_pos: state.layout.player.position.truncate(),
            player_vel: state.player_velocity(),
            held_keys,
        }
    }
}

/// Tessellated egui output, ready for the renderer
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// F3 debug window
#[derive(Default)]
pub struct DebugOverlay {
    ctx: Context,
}

impl DebugOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Input for a canvas that only feeds egui time and size
    pub fn raw_input(width: u32, height: u32, now_ms: f64) -> egui::RawInput {
        egui::RawInput {
            time: Some(now_ms / 1000.0),
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(width as f32, height as f32),
            )),
            ..Default::default()
        }
    }

    pub fn run(&self, raw_input: egui::RawInput, stats: &OverlayStats) -> OverlayFrame {
        let output = self.ctx.run(raw_input, |ctx| draw_debug_window(ctx, stats));
        let pixels_per_point = output.pixels_per_point;
        OverlayFrame {
            primitives: self.ctx.tessellate(output.shapes, pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point,
        }
    }
}

fn draw_debug_window(ctx: &Context, stats: &OverlayStats) {
    egui::Window::new("Debug")
        .default_pos([8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(format!("FPS: {:.0}", stats.fps)).small());
            ui.label(egui::RichText::new(format!("Frames: {}", stats.frames)).small());
            ui.label(
                egui::RichText::new(format!("Pos: x: {:.1} y: {:.1}", stats.player_pos.x, stats.player_pos.y)).small(),
            );
            ui.label(
                egui::RichText::new(format!("Vel: x: {:.2} y: {:.2}", stats.player_vel.x, stats.player_vel.y)).small(),
            );
            let keys = if stats.held_keys.is_empty() {
                "-".to_string()
            } else {
                stats.held_keys.join(" ")
            };
            ui.label(egui::RichText::new(format!("Keys: {keys}")).small());
            ui.separator();
            ui.label(egui::RichText::new("Controls:").small());
            ui.label(egui::RichText::new("Up / W / Space - Jump").small());
            ui.label(egui::RichText::new("Left / A, Right / D - Move").small());
            ui.label(egui::RichText::new("F3 - Toggle this window").small());
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Palette, PhysicsConfig};
    use crate::controller::{GameState, InputEvent, InputProcessor, RapierWorld};
    use crate::model::{Camera, SceneLayout};

    fn game() -> GameLoop<RapierWorld> {
        let physics = PhysicsConfig::default();
        let state = GameState::new(
            SceneLayout::default(),
            RapierWorld::new(physics.gravity),
            physics,
            InputProcessor::default(),
            &Camera::new(400, 400),
        );
        GameLoop::new(state, Palette::default(), 0.0)
    }

    #[test]
    fn test_stats_before_first_frame() {
        let stats = OverlayStats::collect(&game(), &InputState::new());
        assert_eq!(stats.fps, 0.0);
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.player_pos, Vec2::new(200.0, 25.0));
        assert!(stats.held_keys.is_empty());
    }

    #[test]
    fn test_held_keys_are_sorted() {
        let mut input = InputState::new();
        input.process_event(&InputEvent::KeyDown("d".into()));
        input.process_event(&InputEvent::KeyDown("ArrowUp".into()));
        let stats = OverlayStats::collect(&game(), &input);
        assert_eq!(stats.held_keys, vec!["ArrowUp".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_overlay_produces_geometry() {
        let overlay = DebugOverlay::new();
        let stats = OverlayStats { fps: 60.0, frames: 3, ..Default::default() };
        let first = overlay.run(DebugOverlay::raw_input(400, 400, 16.0), &stats);
        // first frame uploads the font atlas
        assert!(!first.textures_delta.set.is_empty());

        // windows are laid out invisibly on their first frame
        let second = overlay.run(DebugOverlay::raw_input(400, 400, 32.0), &stats);
        assert!(!second.primitives.is_empty());
    }
}
