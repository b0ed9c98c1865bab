// SensorStream - Platform Glue
//
// Board glue: concrete collaborators for the pipeline traits.

#[cfg(not(target_os = "espidf"))]
pub mod host;

#[cfg(target_os = "espidf")]
pub mod mic;
#[cfg(all(target_os = "espidf", feature = "ble"))]
pub mod radio;
#[cfg(target_os = "espidf")]
pub mod uart;
