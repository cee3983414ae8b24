//! `multipart/form-data` bodies.
//!
//! The body is already buffered when a handler runs, so parsing drives
//! `multer` to completion on the calling thread. File parts stay in memory
//! while the form fits the configured budget and spill to temporary files
//! afterwards.

use crate::error::BindError;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// A parsed multipart form.
#[derive(Debug, Default, Clone)]
pub struct MultipartForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FileHeader>>,
}

impl MultipartForm {
    /// First value of a non-file field.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn values(&self) -> &HashMap<String, Vec<String>> {
        &self.values
    }

    pub fn file(&self, name: &str) -> Option<&FileHeader> {
        self.files.get(name).and_then(|files| files.first())
    }

    pub fn files(&self, name: &str) -> &[FileHeader] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
enum FileContent {
    Memory(Bytes),
    Disk(Arc<NamedTempFile>),
}

/// An uploaded file part.
#[derive(Debug, Clone)]
pub struct FileHeader {
    filename: String,
    content_type: Option<String>,
    size: u64,
    content: FileContent,
}

impl FileHeader {
    /// The client supplied file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.content, FileContent::Memory(_))
    }

    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        match &self.content {
            FileContent::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            FileContent::Disk(file) => Ok(Box::new(file.reopen()?)),
        }
    }

    /// Copies the content to `dst`, creating missing parent directories.
    pub fn save_to(&self, dst: impl AsRef<Path>) -> io::Result<u64> {
        let dst = dst.as_ref();
        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(dst)?;
        let mut reader = self.open()?;
        io::copy(&mut reader, &mut out)
    }
}

pub(crate) fn parse(content_type: &str, body: Bytes, max_memory: u64) -> Result<MultipartForm, BindError> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures::stream::once(async move { Ok::<Bytes, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    futures::executor::block_on(async move {
        let mut form = MultipartForm::default();
        let mut remaining = max_memory;

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let Some(filename) = field.file_name().map(str::to_string) else {
                let text = field.text().await?;
                remaining = remaining.saturating_sub(text.len() as u64);
                form.values.entry(name).or_default().push(text);
                continue;
            };

            let content_type = field.content_type().map(ToString::to_string);
            let mut buffer = BytesMut::new();
            let mut spilled: Option<NamedTempFile> = None;
            let mut size = 0u64;

            while let Some(chunk) = field.chunk().await? {
                size += chunk.len() as u64;
                if let Some(file) = spilled.as_mut() {
                    file.write_all(&chunk)?;
                    continue;
                }
                if (buffer.len() + chunk.len()) as u64 > remaining {
                    let mut file = NamedTempFile::new()?;
                    file.write_all(&buffer)?;
                    file.write_all(&chunk)?;
                    buffer.clear();
                    spilled = Some(file);
                } else {
                    buffer.extend_from_slice(&chunk);
                }
            }

            let content = match spilled {
                Some(mut file) => {
                    file.flush()?;
                    FileContent::Disk(Arc::new(file))
                }
                None => {
                    remaining = remaining.saturating_sub(buffer.len() as u64);
                    FileContent::Memory(buffer.freeze())
                }
            };
            form.files.entry(name).or_default().push(FileHeader { filename, content_type, size, content });
        }

        Ok::<_, BindError>(form)
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{body, content_type};
    use super::*;

    #[test]
    fn test_parse_values_and_files() {
        let body = body(&[("foo", "bar"), ("foo", "baz"), ("name", "gopher")], &[("file", "test.txt", &b"hello world"[..])]);
        let form = parse(&content_type(), Bytes::from(body), 1 << 20).unwrap();

        assert_eq!(form.value("foo"), Some("bar"));
        assert_eq!(form.values().get("foo").map(Vec::len), Some(2));
        assert_eq!(form.value("name"), Some("gopher"));
        assert_eq!(form.value("missing"), None);

        let file = form.file("file").unwrap();
        assert_eq!(file.filename(), "test.txt");
        assert_eq!(file.content_type(), Some("text/plain"));
        assert_eq!(file.size(), 11);
        assert!(file.is_in_memory());

        let mut content = String::new();
        file.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello world");
        assert!(form.files("other").is_empty());
    }

    #[test]
    fn test_large_files_spill_to_disk() {
        let big = vec![b'x'; 4096];
        let body = body(&[], &[("small", "a.txt", &b"tiny"[..]), ("big", "b.bin", big.as_slice())]);
        let form = parse(&content_type(), Bytes::from(body), 1024).unwrap();

        assert!(form.file("small").unwrap().is_in_memory());
        let spilled = form.file("big").unwrap();
        assert!(!spilled.is_in_memory());
        assert_eq!(spilled.size(), 4096);

        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("nested/out.bin");
        assert_eq!(spilled.save_to(&dst).unwrap(), 4096);
        assert_eq!(fs::read(&dst).unwrap(), big);
    }

    #[test]
    fn test_parse_errors() {
        let err = parse("multipart/form-data", Bytes::from_static(b""), 1024);
        assert!(matches!(err, Err(BindError::Multipart { .. })));

        let err = parse(&content_type(), Bytes::from_static(b"--micro-boundary\r\nbroken"), 1024);
        assert!(matches!(err, Err(BindError::Multipart { .. })));
    }
}
