pub mod rules;
pub mod status;

pub use rules::*;
pub use status::*;
