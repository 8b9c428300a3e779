pub mod cmake;
pub mod error;
pub mod package;
pub mod recipe;
pub mod source;
pub mod templates;
pub mod toolchain;
pub mod utils;
