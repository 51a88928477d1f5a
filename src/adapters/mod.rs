//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `camera`       | CameraPort         | Image files, synthetic froth |
//! | `config_file`  | ConfigPort         | JSON or postcard file        |
//! | `log_sink`     | EventSink          | `log` facade                 |
//! | `motor`        | MotorOutputPort    | embedded-hal PWM, simulation |
//! | `stop_signal`  | StopSignalPort     | embedded-hal GPIO, atomic    |
//! | `time`         | Clock              | `std::time::Instant`         |

pub mod camera;
pub mod config_file;
pub mod log_sink;
pub mod motor;
pub mod stop_signal;
pub mod time;
