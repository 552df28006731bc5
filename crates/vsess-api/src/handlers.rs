//! Request handlers.

pub mod assets;
pub mod download;
pub mod frame;
pub mod health;
pub mod params;
pub mod transform;
pub mod upload;

pub use assets::*;
pub use download::*;
pub use frame::*;
pub use health::*;
pub use transform::*;
pub use upload::*;
