pub mod memory;

#[cfg(feature = "remote-connectivity")]
pub mod http;
