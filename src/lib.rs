// Jobworker - job execution worker
// Library exports

pub mod client; // Step command side of the control channel
pub mod config;
pub mod interpolate;
pub mod job;
pub mod server; // Loopback control server run by the daemon
