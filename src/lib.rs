//! Before/after page screenshots and pixel-level visual comparison.

pub mod api;
pub mod capture;
pub mod compare;
pub mod error;
pub mod history;
pub mod settings;
pub mod stabilizer;
pub mod utils;

pub use error::{VrtError, VrtResult};
