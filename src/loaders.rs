//! Resource loading utilities
//!
//! This module opens documents from a [`Location`] as buffered byte streams
//! for the streaming reader, or loads them whole for the DOM reader.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Cursor};

/// Resource loader for documents
#[derive(Debug, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Get the limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Open a resource as a buffered stream
    ///
    /// Files are not read up front; the size check uses file metadata.
    pub fn open(&self, location: &Location) -> Result<Box<dyn BufRead>> {
        match location {
            Location::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to open file '{}': {}", path.display(), e),
                    ))
                })?;
                let len = file.metadata()?.len();
                self.limits.check_xml_size(len as usize)?;
                Ok(Box::new(BufReader::new(file)))
            }
            Location::String(s) => {
                self.limits.check_xml_size(s.len())?;
                Ok(Box::new(Cursor::new(s.clone().into_bytes())))
            }
            Location::Bytes(b) => {
                self.limits.check_xml_size(b.len())?;
                Ok(Box::new(Cursor::new(b.clone())))
            }
        }
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        match location {
            Location::Path(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to read file '{}': {}", path.display(), e),
                    ))
                })?;

                self.limits.check_xml_size(content.len())?;

                Ok(content)
            }
            Location::String(s) => {
                self.limits.check_xml_size(s.len())?;
                Ok(s.clone())
            }
            Location::Bytes(b) => {
                self.limits.check_xml_size(b.len())?;
                String::from_utf8(b.clone())
                    .map_err(|e| Error::Value(format!("Document is not valid UTF-8: {}", e)))
            }
        }
    }
}
