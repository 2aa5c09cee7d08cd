mod comm_errors;

pub use comm_errors::DeviceCommError;
