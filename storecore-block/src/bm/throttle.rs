//! External capacity throttle collaborator.

/// Direction of a throttled I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

/// The external capacity throttle collaborator: informed of I/O volume
/// before it happens so it can apply backpressure.
pub trait CapacityThrottle: Send + Sync {
    fn throttle(&self, session: u64, bytes: u64, direction: IoDirection);
}

/// A throttle that never applies backpressure, useful as the default when
/// none is configured.
#[derive(Default)]
pub struct NoThrottle;

impl CapacityThrottle for NoThrottle {
    fn throttle(&self, _session: u64, _bytes: u64, _direction: IoDirection) {}
}
