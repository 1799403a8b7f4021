pub mod controller;
pub(crate) mod signal;

pub use controller::SessionController;
