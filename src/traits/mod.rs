pub mod backend;
pub mod custom_pass;

pub use backend::*;
pub use custom_pass::*;
