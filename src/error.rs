use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// ErrStreamManagerClosed indicates an operation executed after the
    /// stream manager has already been closed.
    #[error("stream manager closed")]
    ErrStreamManagerClosed,

    /// ErrConferenceEntryNoSender indicates that a conference entry exposes
    /// no sender to carry an outgoing track.
    #[error("conference entry has no sender")]
    ErrConferenceEntryNoSender,

    /// ErrTransceiverSetupFailed indicates that a conference entry could not
    /// allocate or configure its send transceiver.
    #[error("transceiver setup failed")]
    ErrTransceiverSetupFailed,

    /// ErrTransport indicates a negotiation or transport level failure while
    /// replacing an outgoing track.
    #[error("transport failure")]
    ErrTransport,

    #[allow(non_camel_case_types)]
    #[error("{0}")]
    new(String),
}
