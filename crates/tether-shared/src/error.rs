use thiserror::Error;

#[derive(Error, Debug)]
pub enum TetherError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Room code error: {0}")]
    RoomCode(#[from] RoomCodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Envelope encoding failed: {0}")]
    Encode(String),

    #[error("Envelope decoding failed")]
    Decode,
}

#[derive(Error, Debug)]
pub enum RoomCodeError {
    #[error("Room code must be {expected} characters, got {got}")]
    Length { expected: usize, got: usize },

    #[error("Room code contains invalid character '{0}'")]
    Charset(char),
}
