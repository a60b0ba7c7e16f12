use std::cell::Cell;
use std::rc::Rc;

use crate::config::Palette;
use crate::controller::game_state::GameState;
use crate::controller::input::InputSource;
use crate::controller::physics::PhysicsWorld;
use crate::error::GameError;
use crate::view::render::{render_scene, Renderer};

/// Turns millisecond timestamps into clamped frame deltas in seconds
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_ms: f64,
    max_dt: f32,
}

impl FrameClock {
    pub fn new(now_ms: f64, max_dt: f32) -> Self {
        Self { last_ms: now_ms, max_dt }
    }

    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let dt = ((now_ms - self.last_ms) / 1000.0).clamp(0.0, self.max_dt as f64) as f32;
        self.last_ms = now_ms;
        dt
    }
}

/// Shared "keep going" flag; cloning gives another handle to the same loop
#[derive(Debug, Clone)]
pub struct LoopHandle(Rc<Cell<bool>>);

impl LoopHandle {
    pub fn stop(&self) {
        self.0.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.0.get()
    }
}

/// Owns the game state and drives one physics step plus one render per frame
pub struct GameLoop<W: PhysicsWorld> {
    state: GameState<W>,
    palette: Palette,
    clock: FrameClock,
    running: LoopHandle,
    frames: u64,
    last_dt: f32,
}

impl<W: PhysicsWorld> GameLoop<W> {
    pub fn new(state: GameState<W>, palette: Palette, now_ms: f64) -> Self {
        let max_dt = state.physics_config().max_frame_dt;
        Self {
            state,
            palette,
            clock: FrameClock::new(now_ms, max_dt),
            running: LoopHandle(Rc::new(Cell::new(true))),
            frames: 0,
            last_dt: 0.0,
        }
    }

    pub fn state(&self) -> &GameState<W> {
        &self.state
    }

    pub fn handle(&self) -> LoopHandle {
        self.running.clone()
    }

    pub fn stop(&self) {
        self.running.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_dt(&self) -> f32 {
        self.last_dt
    }

    /// Run one scheduled frame. Returns whether the scheduler should call again.
    pub fn frame<R: Renderer>(
        &mut self,
        now_ms: f64,
        input: &impl InputSource,
        renderer: &mut R,
    ) -> Result<bool, GameError> {
        if !self.is_running() {
            return Ok(false);
        }
        let dt = self.clock.tick(now_ms);
        if let Err(e) = self.advance(input, dt, renderer) {
            self.stop();
            return Err(e);
        }
        Ok(self.is_running())
    }

    /// Run `steps` frames of exactly `dt` seconds, bypassing the clock
    pub fn run_fixed<R: Renderer>(
        &mut self,
        steps: usize,
        dt: f32,
        input: &impl InputSource,
        renderer: &mut R,
    ) -> Result<(), GameError> {
        for _ in 0..steps {
            if !self.is_running() {
                break;
            }
            self.advance(input, dt, renderer)?;
        }
        Ok(())
    }

    fn advance<R: Renderer>(
        &mut self,
        input: &impl InputSource,
        dt: f32,
        renderer: &mut R,
    ) -> Result<(), GameError> {
        self.state.step_physics(input, dt);
        render_scene(&self.state, &self.palette, renderer)?;
        self.frames += 1;
        self.last_dt = dt;
        Ok(())
    }
}
