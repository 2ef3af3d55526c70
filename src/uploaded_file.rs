use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};
use crate::stream::Stream;

/// Status of a file upload, using the conventional upload error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// No error, the upload succeeded.
    Ok,
    /// Exceeds the server's configured maximum size.
    IniSize,
    /// Exceeds the maximum size given by the submitting form.
    FormSize,
    /// Only partially uploaded.
    Partial,
    /// No file was uploaded.
    NoFile,
    /// Missing a temporary folder.
    NoTmpDir,
    /// Failed to write to disk.
    CantWrite,
    /// Stopped by an extension.
    Extension,
}

impl UploadError {
    pub fn code(self) -> u8 {
        use UploadError::*;
        match self {
            Ok => 0,
            IniSize => 1,
            FormSize => 2,
            Partial => 3,
            NoFile => 4,
            NoTmpDir => 6,
            CantWrite => 7,
            Extension => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use UploadError::*;
        let status = match code {
            0 => Ok,
            1 => IniSize,
            2 => FormSize,
            3 => Partial,
            4 => NoFile,
            6 => NoTmpDir,
            7 => CantWrite,
            8 => Extension,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_ok(self) -> bool {
        self == UploadError::Ok
    }
}

impl Default for UploadError {
    fn default() -> Self {
        UploadError::Ok
    }
}

/// Optional parts of an uploaded file.
///
/// - `size`: `None` means ask the stream for its size.
/// - `error`: defaults to `UploadError::Ok`.
/// - `client_filename`, `client_media_type`: as sent by the client, never trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFileOptions {
    pub size: Option<u64>,
    pub error: UploadError,
    pub client_filename: Option<String>,
    pub client_media_type: Option<String>,
}

/// A file submitted with an incoming request.
#[derive(Debug)]
pub struct UploadedFile {
    stream: Option<Stream>,
    size: Option<u64>,
    error: UploadError,
    client_filename: Option<String>,
    client_media_type: Option<String>,
}

impl UploadedFile {
    pub fn new(stream: Stream, opts: UploadedFileOptions) -> Self {
        let size = opts.size.or_else(|| stream.size());
        Self {
            stream: Some(stream),
            size,
            error: opts.error,
            client_filename: opts.client_filename,
            client_media_type: opts.client_media_type,
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadError {
        self.error
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    /// The uploaded content. Unavailable if the upload failed or the file was moved.
    pub fn stream(&mut self) -> Result<&mut Stream> {
        self.check_available()?;
        self.stream
            .as_mut()
            .ok_or(Error::UploadUnavailable("file has already been moved"))
    }

    /// Write the uploaded content to `target`. Succeeds at most once; a failed move leaves the
    /// upload in place so it can be retried.
    pub fn move_to<P: AsRef<Path>>(&mut self, target: P) -> Result<()> {
        self.check_available()?;
        let stream = self
            .stream
            .as_mut()
            .ok_or(Error::UploadUnavailable("file has already been moved"))?;

        if stream.is_seekable() {
            stream.rewind()?;
        }
        let mut file = File::create(target.as_ref())?;
        let written = io::copy(stream, &mut file)?;
        tracing::debug!("moved uploaded file to {:?}, {} bytes", target.as_ref(), written);

        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        Ok(())
    }

    pub fn is_moved(&self) -> bool {
        self.stream.is_none()
    }

    fn check_available(&self) -> Result<()> {
        if !self.error.is_ok() {
            return Err(Error::UploadUnavailable("upload failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_from_stream() {
        let file = UploadedFile::new(Stream::from("twelve bytes"), UploadedFileOptions::default());
        assert_eq!(file.size(), Some(12));
        assert_eq!(file.error(), UploadError::Ok);
        assert_eq!(file.client_filename(), None);
        assert_eq!(file.client_media_type(), None);
    }

    #[test]
    fn test_unknown_size() {
        let stream = Stream::from_reader(io::empty(), None);
        let file = UploadedFile::new(stream, UploadedFileOptions::default());
        assert_eq!(file.size(), None);
    }

    #[test]
    fn test_error_status() {
        let mut file = UploadedFile::new(
            Stream::empty(),
            UploadedFileOptions {
                error: UploadError::Partial,
                ..Default::default()
            },
        );
        assert!(file.stream().is_err());
        assert_eq!(UploadError::from_code(file.error().code()), Some(UploadError::Partial));
        assert_eq!(UploadError::from_code(5), None);
    }

    #[test]
    fn test_move_to_once() {
        let target = std::env::temp_dir().join(format!("http-factory-upload-{}", std::process::id()));
        let mut file = UploadedFile::new(
            Stream::from("uploaded"),
            UploadedFileOptions {
                client_filename: Some("a.txt".into()),
                client_media_type: Some("text/plain".into()),
                ..Default::default()
            },
        );
        assert_eq!(file.stream().unwrap().contents().unwrap(), "uploaded");

        file.move_to(&target).unwrap();
        assert!(file.is_moved());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "uploaded");
        assert!(file.move_to(&target).is_err());
        assert!(file.stream().is_err());
        assert_eq!(file.client_filename(), Some("a.txt"));

        std::fs::remove_file(&target).unwrap();
    }

    #[test]
    fn test_failed_move_keeps_upload() {
        let missing_dir = std::env::temp_dir()
            .join(format!("http-factory-missing-{}", std::process::id()))
            .join("out");
        let mut file = UploadedFile::new(Stream::from("kept"), UploadedFileOptions::default());

        assert!(file.move_to(&missing_dir).unwrap_err().kind() == crate::ErrorKind::Io);
        assert!(!file.is_moved());
        assert_eq!(file.stream().unwrap().contents().unwrap(), "kept");

        let target = std::env::temp_dir().join(format!("http-factory-retry-{}", std::process::id()));
        file.move_to(&target).unwrap();
        assert!(file.is_moved());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "kept");
        std::fs::remove_file(&target).unwrap();
    }
}
