pub mod clip;
pub mod device;
pub mod mock;
