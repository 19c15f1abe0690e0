use crate::errors::*;
use crate::privdrop::PrivDrop;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Where nslcd keeps its configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nslcd.conf";

/// The user to run as when the file does not set `uid`
pub const DEFAULT_USER: &str = "nobody";

/// Settings read from an `nslcd.conf(5)` style file
///
/// Only the user and group to run as, and the directory connection settings,
/// are kept. Every other key is ignored.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub uri: Option<String>,
    pub base: Option<String>,
    pub binddn: Option<String>,
    pub bindpw: Option<String>,
    pub uid: String,
    /// Without it, the primary group of `uid` is used
    pub gid: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            uri: None,
            base: None,
            binddn: None,
            bindpw: None,
            uid: DEFAULT_USER.to_owned(),
            gid: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("uri", &self.uri)
            .field("base", &self.base)
            .field("binddn", &self.binddn)
            .field("bindpw", &self.bindpw.as_ref().map(|_| "<redacted>"))
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .finish()
    }
}

impl Config {
    /// Read and parse a configuration file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PrivDropError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            PrivDropError::from(e)
                .at(Step::LoadConfig)
                .about(path.display())
        })?;
        contents.parse()
    }

    /// A `PrivDrop` switching to the configured user and group
    pub fn privdrop(&self) -> PrivDrop {
        let privdrop = PrivDrop::default().user(&self.uid);
        match self.gid {
            Some(ref gid) => privdrop.group(gid),
            None => privdrop,
        }
    }
}

impl FromStr for Config {
    type Err = PrivDropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut config = Config::default();
        for (number, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.find(char::is_whitespace) {
                Some(at) => (&line[..at], line[at..].trim()),
                None => (line, ""),
            };
            if value.is_empty() {
                return Err(
                    PrivDropError::from((ErrorKind::InvalidConfig, "Missing value"))
                        .at(Step::LoadConfig)
                        .about(format!("line {}: {}", number + 1, key)),
                );
            }
            let value = value.to_owned();
            match key.to_ascii_lowercase().as_str() {
                "uri" => config.uri = Some(value),
                "base" => config.base = Some(value),
                "binddn" => config.binddn = Some(value),
                "bindpw" => config.bindpw = Some(value),
                "uid" => config.uid = value,
                "gid" => config.gid = Some(value),
                _ => {}
            }
        }
        Ok(config)
    }
}
