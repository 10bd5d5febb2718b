pub mod actions;
pub mod diagnosis;
pub mod origin;

pub use actions::*;
pub use diagnosis::*;
pub use origin::*;
