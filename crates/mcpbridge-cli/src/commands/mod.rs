pub mod dev;
pub mod host;
pub mod serve;
