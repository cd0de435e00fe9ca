use core::fmt;

/// Failure reported by a board collaborator or by the core itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// No such device.
    NoDevice,
    /// Device present but holds no medium, e.g. an empty card slot.
    NoMedium,
    Io,
    Timeout,
    NoMemory,
    Invalid,
    NotSupported,
    BadMagic,
    BadChecksum,
    TooLarge,
    /// Two memory regions that must stay apart overlap.
    Overlap,
    Busy,
}

impl Error {
    /// Negative errno, as printed in board diagnostics.
    pub const fn errno(self) -> i32 {
        match self {
            Self::NoDevice => -19,
            Self::NoMedium => -123,
            Self::Io => -5,
            Self::Timeout => -110,
            Self::NoMemory => -12,
            Self::Invalid => -22,
            Self::NotSupported => -95,
            Self::BadMagic => -74,
            Self::BadChecksum => -84,
            Self::TooLarge => -27,
            Self::Overlap => -14,
            Self::Busy => -16,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NoDevice => "no such device",
            Self::NoMedium => "no medium found",
            Self::Io => "I/O error",
            Self::Timeout => "timed out",
            Self::NoMemory => "out of memory",
            Self::Invalid => "invalid argument",
            Self::NotSupported => "not supported",
            Self::BadMagic => "bad magic",
            Self::BadChecksum => "bad checksum",
            Self::TooLarge => "too large",
            Self::Overlap => "regions overlap",
            Self::Busy => "device busy",
        };
        write!(f, "{msg} (err={})", self.errno())
    }
}

impl From<common::image::Error> for Error {
    fn from(value: common::image::Error) -> Self {
        use common::image::Error::*;
        match value {
            Truncated => Self::Io,
            BadMagic => Self::BadMagic,
            BadHeaderCrc | BadDataCrc => Self::BadChecksum,
            Compressed => Self::NotSupported,
        }
    }
}

impl From<common::env::Error> for Error {
    fn from(value: common::env::Error) -> Self {
        use common::env::Error::*;
        match value {
            Truncated => Self::Io,
            BadCrc => Self::BadChecksum,
            TooLarge => Self::TooLarge,
            InvalidEntry => Self::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn display_carries_errno() {
        assert_eq!(Error::NoDevice.to_string(), "no such device (err=-19)");
        assert_eq!(Error::Timeout.errno(), -110);
    }

    #[test]
    fn image_errors_map_to_checksum_and_magic() {
        assert_eq!(Error::from(common::image::Error::BadDataCrc), Error::BadChecksum);
        assert_eq!(Error::from(common::image::Error::BadMagic), Error::BadMagic);
        assert_eq!(Error::from(common::env::Error::BadCrc), Error::BadChecksum);
    }
}
