//! Reader side of a data distribution service transport.
//!
//! A gateway that bridges samples from a DDS network into shared memory
//! talks to the network through a [`DataReader`]. Each backend (one per DDS
//! implementation) provides its own type implementing the trait; the gateway
//! only sees `dyn DataReader` or a generic `R: DataReader`.

use lithos_core::BoundedString;

/// Maximum length of a service, instance or event identifier.
pub const ID_SIZE: usize = 100;

pub type IdString = BoundedString<ID_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DataReaderError {
    #[error("data reader is not connected")]
    NotConnected,
}

pub trait DataReader {
    /// Connect to the underlying DDS network.
    ///
    /// Failures surface on the next `read` as `NotConnected`.
    fn connect(&mut self);

    /// Read available samples into `buffer`.
    ///
    /// Returns the number of samples read.
    fn read(&self, buffer: &mut [u8]) -> Result<u8, DataReaderError>;

    /// ID of the service producing the data.
    fn service_id(&self) -> IdString;

    /// ID of the instance of the service producing the data.
    fn instance_id(&self) -> IdString;

    /// ID of the event producing the data.
    fn event_id(&self) -> IdString;
}
