use crate::gatt::constants::BLUEZ_ERROR_PREFIX;
use strum::{Display, IntoStaticStr};

pub type Result<T> = std::result::Result<T, Error>;

/// Kind of failure.
///
/// The string form of each kind is the name of the BlueZ fault a remote
/// central receives when the error crosses the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorType {
    /// A callback slot was invoked while nothing was bound to it.
    #[strum(serialize = "NotSupported")]
    NotImplemented,
    NotPermitted,
    NotAuthorized,
    InvalidOffset,
    InvalidValueLength,
    InvalidArguments,
    #[strum(serialize = "DoesNotExist")]
    NotFound,
    /// The bus or the Bluetooth daemon rejected an outbound call.
    #[strum(serialize = "Failed")]
    Transport,
    Failed,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct Error {
    pub message: String,
    pub description: String,
    pub error_type: ErrorType,
}

impl Error {
    pub fn new(
        message: impl Into<String>,
        description: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Error {
            message: message.into(),
            description: description.into(),
            error_type,
        }
    }

    pub fn from_type(error_type: ErrorType) -> Self {
        let message = match error_type {
            ErrorType::NotImplemented => "no callback bound",
            ErrorType::NotPermitted => "operation not permitted",
            ErrorType::NotAuthorized => "operation not authorized",
            ErrorType::InvalidOffset => "invalid offset",
            ErrorType::InvalidValueLength => "invalid value length",
            ErrorType::InvalidArguments => "invalid arguments",
            ErrorType::NotFound => "not found",
            ErrorType::Transport => "bus call failed",
            ErrorType::Failed => "operation failed",
        };
        Error::new(message, "", error_type)
    }

    pub fn kind(&self) -> ErrorType {
        self.error_type
    }

    /// Name of the bus fault this error is reported as.
    pub fn fault_name(&self) -> String {
        let name: &'static str = self.error_type.into();
        format!("{}{}", BLUEZ_ERROR_PREFIX, name)
    }
}
