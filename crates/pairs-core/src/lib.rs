pub mod bar;
pub mod error;
pub mod types;

pub use bar::*;
pub use error::*;
pub use types::*;
