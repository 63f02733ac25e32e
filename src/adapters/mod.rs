//! Adapters between the operator's driver seam and concrete backends

mod http_driver;

pub use http_driver::*;
