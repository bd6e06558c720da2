use std::path::Path;

use crate::errors::Error;

/// The on-disk timestamp encodings we know how to read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileFormat {
    /// PicoQuant PicoHarp 300 T2 mode, `.pt2`.
    Pt2,
    /// FPGA timetagger strobe records, `.timetag`.
    Timetag,
    /// Bare little-endian u64 timestamps, `.times`.
    Raw,
}

impl FileFormat {
    /// Determine the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pt2") => Ok(FileFormat::Pt2),
            Some("timetag") => Ok(FileFormat::Timetag),
            Some("times") => Ok(FileFormat::Raw),
            _ => Err(Error::UnrecognizedFileType(path.display().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn known_extensions() {
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("run1.pt2")).unwrap(),
            FileFormat::Pt2
        );
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("run1.timetag")).unwrap(),
            FileFormat::Timetag
        );
        assert_eq!(
            FileFormat::from_path(&PathBuf::from("run1.times")).unwrap(),
            FileFormat::Raw
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileFormat::from_path(&PathBuf::from("run1.csv")).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFileType(_)));
    }
}
