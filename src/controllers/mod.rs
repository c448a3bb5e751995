pub mod session_controller;

pub use session_controller::{FeedbackError, SessionController, TurnState};
