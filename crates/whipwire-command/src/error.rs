/// Errors raised when converting commands to or from their encoded forms.
///
/// Decoding a payload never fails; see [`crate::CommandDecoder`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Diagnostic commands exist only for logging and have no wire form.
    #[error("{0} has no wire encoding")]
    NotEncodable(&'static str),

    /// The command cannot be carried to the renderer.
    #[error("{0} is not transported to the renderer")]
    NotTransportable(&'static str),

    /// A transport record was not valid JSON for the record schema.
    #[error("invalid command record: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;
