use crate::{Error, ErrorType};
use dbus::MethodErr;

impl From<bluer::Error> for Error {
    fn from(value: bluer::Error) -> Self {
        Error::new(
            format!("bluer::Error: {}", value),
            format!("{:?}", value),
            ErrorType::Transport,
        )
    }
}

impl From<dbus::Error> for Error {
    fn from(value: dbus::Error) -> Self {
        Error::new(
            value.name().unwrap_or("dbus::Error").to_string(),
            value.message().unwrap_or_default().to_string(),
            ErrorType::Transport,
        )
    }
}

impl From<Error> for MethodErr {
    fn from(value: Error) -> Self {
        MethodErr::from((value.fault_name(), value.message.as_str()))
    }
}
