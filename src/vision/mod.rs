pub mod capture;
pub mod convert;
pub mod encoder;
pub mod sampler;
pub mod synthetic;
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2;
