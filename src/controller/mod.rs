// CONTROLLER: Input, game logic, and update loop
pub mod input;
pub mod physics;
pub mod game_state;
pub mod frame_loop;

pub use input::{InputEvent, InputProcessor, InputSource, InputState, KeyBindings};
pub use physics::{BodyHandle, PhysicsWorld, RapierWorld};
pub use game_state::GameState;
pub use frame_loop::{FrameClock, GameLoop, LoopHandle};
