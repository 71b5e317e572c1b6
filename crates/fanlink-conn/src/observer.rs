use crate::error::ConnectionError;

/// Notifications a framed connection raises toward its owner.
///
/// All notifications are delivered synchronously from the connection's
/// read loop, so implementations must not block for long.
pub trait ConnectionObserver<M>: Send + Sync {
    /// One complete application message was decoded.
    fn message_arrived(&self, message: M);

    /// The connection failed; it is disposed immediately afterwards.
    fn connection_error(&self, error: &ConnectionError);

    /// The connection finished, for any reason. Fires exactly once per
    /// connection lifetime.
    fn connection_closed(&self);
}
