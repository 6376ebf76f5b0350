pub mod arena;
pub mod logging;
