//! Pin drivers, peripheral setup and the host simulation layer.

pub mod gpio;
pub mod hw_init;
pub mod repeater;
#[cfg(not(target_os = "espidf"))]
pub mod sim;
pub mod square_wave;
#[cfg(target_os = "espidf")]
pub mod twai;
