use std::fmt;

#[derive(Debug)]
pub enum AmpCssError {
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for AmpCssError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmpCssError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            AmpCssError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for AmpCssError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AmpCssError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AmpCssError {
    fn from(value: std::io::Error) -> Self {
        AmpCssError::Io(value)
    }
}
