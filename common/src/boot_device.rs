//! Boot sources the first stage can load the next one from.

use core::{fmt, str::FromStr};

/// A boot source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BootDevice {
    /// SD/eMMC controller, numbered from 1 like the board silkscreen.
    Mmc(u8),
    Nand,
    Spi,
    Nor,
    Usb,
    /// Image already present in RAM, e.g. put there by a debugger.
    Ram,
    Uart,
    /// Board-specific source.
    Board(u8),
}

impl fmt::Display for BootDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mmc(n) => write!(f, "MMC{n}"),
            Self::Nand => f.write_str("NAND"),
            Self::Spi => f.write_str("SPI"),
            Self::Nor => f.write_str("NOR"),
            Self::Usb => f.write_str("USB"),
            Self::Ram => f.write_str("RAM"),
            Self::Uart => f.write_str("UART"),
            Self::Board(n) => write!(f, "BOARD{n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownDevice;

impl fmt::Display for UnknownDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown boot device")
    }
}

impl FromStr for BootDevice {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn numbered(s: &str, prefix: &str) -> Option<u8> {
            let head = s.get(..prefix.len())?;
            if !head.eq_ignore_ascii_case(prefix) {
                return None;
            }
            s[prefix.len()..].parse().ok()
        }

        const PLAIN: [(&str, BootDevice); 6] = [
            ("nand", BootDevice::Nand),
            ("spi", BootDevice::Spi),
            ("nor", BootDevice::Nor),
            ("usb", BootDevice::Usb),
            ("ram", BootDevice::Ram),
            ("uart", BootDevice::Uart),
        ];
        if let Some((_, dev)) = PLAIN.iter().find(|(name, _)| s.eq_ignore_ascii_case(name)) {
            return Ok(*dev);
        }
        if let Some(n) = numbered(s, "mmc") {
            return Ok(Self::Mmc(n));
        }
        if let Some(n) = numbered(s, "board") {
            return Ok(Self::Board(n));
        }
        Err(UnknownDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn names_round_trip() {
        for dev in [
            BootDevice::Mmc(1),
            BootDevice::Mmc(2),
            BootDevice::Nand,
            BootDevice::Spi,
            BootDevice::Nor,
            BootDevice::Usb,
            BootDevice::Ram,
            BootDevice::Uart,
            BootDevice::Board(3),
        ] {
            assert_eq!(dev.to_string().parse::<BootDevice>(), Ok(dev));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("mmc1".parse::<BootDevice>(), Ok(BootDevice::Mmc(1)));
        assert_eq!("Spi".parse::<BootDevice>(), Ok(BootDevice::Spi));
        assert_eq!("mmc".parse::<BootDevice>(), Err(UnknownDevice));
        assert_eq!("sata".parse::<BootDevice>(), Err(UnknownDevice));
        assert_eq!("mmc256".parse::<BootDevice>(), Err(UnknownDevice));
    }
}
