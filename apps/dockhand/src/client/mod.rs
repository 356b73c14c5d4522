pub mod capture;
pub mod controller;
pub mod greeting;
pub mod plain;
pub mod status;
pub mod terminal;

pub use controller::{ClientEvent, Controller, ControllerError, SubmitOutcome};
