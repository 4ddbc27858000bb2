pub mod enable_debug;
pub mod status;
