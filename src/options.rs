use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Dataset;

/// How the underlying file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Read-only access to an existing file.
    #[default]
    #[serde(rename = "r", alias = "read")]
    Read,
    /// Create a new file.
    #[serde(rename = "w", alias = "write")]
    Write,
    /// Read-write access to an existing file.
    #[serde(rename = "a", alias = "r+", alias = "append")]
    Append,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::Write => "w",
            Mode::Append => "a",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(Mode::Read),
            "w" | "write" => Ok(Mode::Write),
            "a" | "r+" | "append" => Ok(Mode::Append),
            s => Err(crate::Error::general(format!("invalid open mode {s:?}"))),
        }
    }
}

/// On-disk format identifier.
///
/// Only consulted when creating a file; existing files are detected from the path.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Format {
    #[default]
    #[serde(rename = "NETCDF4")]
    Netcdf4,
    #[serde(rename = "NETCDF4_CLASSIC")]
    Netcdf4Classic,
    #[serde(rename = "NETCDF3_CLASSIC")]
    Netcdf3Classic,
    #[serde(rename = "NETCDF3_64BIT_OFFSET")]
    Netcdf3Offset64,
    #[serde(rename = "NETCDF3_64BIT_DATA")]
    Netcdf3Data64,
    /// Zarr v3 hierarchy on the local filesystem.
    #[serde(rename = "ZARR")]
    Zarr,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Netcdf4 => "NETCDF4",
            Format::Netcdf4Classic => "NETCDF4_CLASSIC",
            Format::Netcdf3Classic => "NETCDF3_CLASSIC",
            Format::Netcdf3Offset64 => "NETCDF3_64BIT_OFFSET",
            Format::Netcdf3Data64 => "NETCDF3_64BIT_DATA",
            Format::Zarr => "ZARR",
        }
    }

    pub fn is_netcdf(&self) -> bool {
        !matches!(self, Format::Zarr)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let out = match s {
            "NETCDF4" => Format::Netcdf4,
            "NETCDF4_CLASSIC" => Format::Netcdf4Classic,
            "NETCDF3_CLASSIC" => Format::Netcdf3Classic,
            "NETCDF3_64BIT_OFFSET" | "NETCDF3_64BIT" => Format::Netcdf3Offset64,
            "NETCDF3_64BIT_DATA" => Format::Netcdf3Data64,
            "ZARR" => Format::Zarr,
            s => return Err(crate::Error::general(format!("unknown format {s:?}"))),
        };
        Ok(out)
    }
}

/// Parameters used to open a [Dataset].
///
/// Everything except `convert_booleans` is handed to the data-access library unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    pub mode: Mode,
    /// Overwrite an existing file when creating.
    pub clobber: bool,
    /// Keep the file in memory instead of on disk.
    pub diskless: bool,
    /// Write a diskless file back to disk on close.
    pub persist: bool,
    pub format: Format,
    /// Turn "T"/"F" global attributes into booleans.
    pub convert_booleans: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Read,
            clobber: true,
            diskless: false,
            persist: false,
            format: Format::Netcdf4,
            convert_booleans: true,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from a JSON object; missing keys take their defaults.
    pub fn from_json(s: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn clobber(&mut self, clobber: bool) -> &mut Self {
        self.clobber = clobber;
        self
    }

    pub fn diskless(&mut self, diskless: bool) -> &mut Self {
        self.diskless = diskless;
        self
    }

    pub fn persist(&mut self, persist: bool) -> &mut Self {
        self.persist = persist;
        self
    }

    pub fn format(&mut self, format: Format) -> &mut Self {
        self.format = format;
        self
    }

    pub fn convert_booleans(&mut self, convert: bool) -> &mut Self {
        self.convert_booleans = convert;
        self
    }

    pub fn open(&self, path: impl AsRef<Path>) -> crate::Result<Dataset> {
        Dataset::open_with(path, self)
    }
}
