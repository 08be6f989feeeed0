pub mod controller;

pub use controller::{LetterReport, Posterity, SHUTDOWN_BROADCAST};
