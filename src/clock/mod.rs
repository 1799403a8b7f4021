pub mod controller;
pub mod state;

pub use controller::Clock;
pub use state::{ClockState, ClockStatus};
