pub mod relay;
pub mod session;
