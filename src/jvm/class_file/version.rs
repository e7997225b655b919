use crate::jvm::class_file::Serialize;
use crate::jvm::Error;
use byteorder::WriteBytesExt;

/// Class file version, serialized as minor then major
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-B.2
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const JAVA8: Version = Version {
        major: 52,
        minor: 0,
    };
    pub const JAVA11: Version = Version {
        major: 55,
        minor: 0,
    };
    pub const JAVA17: Version = Version {
        major: 61,
        minor: 0,
    };

    /// Latest version this crate knows how to rewrite
    pub const MAX_SUPPORTED: Version = Version::JAVA17;

    pub fn checked(major: u16, minor: u16) -> Result<Version, Error> {
        let version = Version { major, minor };
        if version > Version::MAX_SUPPORTED {
            return Err(Error::UnsupportedVersion { major, minor });
        }
        Ok(version)
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.minor.serialize(writer)?;
        self.major.serialize(writer)
    }
}
