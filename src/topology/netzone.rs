//! Netzones: named CIDR lists loaded from `<name>.txt` data files

use crate::error::TopologyError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File suffix of netzone data files
pub const NETZONE_SUFFIX: &str = ".txt";

/// A named, ordered list of CIDR prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetZone {
    pub name: String,
    pub file: PathBuf,
    pub cidrs: Vec<String>,
}

impl fmt::Display for NetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<NetZone name={} cidrs={} file={}>",
            self.name,
            self.cidrs.len(),
            self.file.display()
        )
    }
}

impl NetZone {
    /// Read a zone file; an unreadable file is fatal since it means broken installed data
    pub fn load(name: impl Into<String>, file: &Path) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(file).map_err(|source| TopologyError::NetZoneRead {
            path: file.to_path_buf(),
            source,
        })?;

        let zone = Self {
            name: name.into(),
            file: file.to_path_buf(),
            cidrs: parse_zone(&content),
        };
        debug!("Loaded netzone: {}", zone);
        Ok(zone)
    }
}

/// Keep the token in front of the first `;`, `#` or space on every line
pub fn parse_zone(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| {
            let end = line.find([';', '#', ' ']).unwrap_or(line.len());
            line[..end].trim()
        })
        .filter(|cidr| !cidr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lookup table of all netzones found on the search path
#[derive(Debug, Clone, Default)]
pub struct NetZoneCatalog {
    zones: HashMap<String, NetZone>,
}

impl NetZoneCatalog {
    /// Scan `search_path` in order. The first file found for a zone name wins,
    /// missing directories are skipped with a warning.
    pub fn load<P: AsRef<Path>>(search_path: &[P]) -> Result<Self, TopologyError> {
        let mut zones = HashMap::new();

        for dir in search_path {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                warn!("netzone search path does not exist: {}", dir.display());
                continue;
            }

            for file in zone_files(dir)? {
                let Some(name) = zone_name(&file) else {
                    continue;
                };
                if zones.contains_key(&name) {
                    debug!(
                        "netzone {} already loaded, ignoring {}",
                        name,
                        file.display()
                    );
                    continue;
                }
                let zone = NetZone::load(name.clone(), &file)?;
                zones.insert(name, zone);
            }
        }

        Ok(Self { zones })
    }

    pub fn get(&self, name: &str) -> Option<&NetZone> {
        self.zones.get(name)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// All zones sorted by name
    pub fn zones(&self) -> Vec<&NetZone> {
        let mut zones: Vec<_> = self.zones.values().collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        zones
    }
}

/// Zone files of one directory, sorted so the scan order does not depend on the filesystem
fn zone_files(dir: &Path) -> Result<Vec<PathBuf>, TopologyError> {
    let scan_error = |source| TopologyError::NetZoneScan {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(scan_error)? {
        let path = entry.map_err(scan_error)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn zone_name(file: &Path) -> Option<String> {
    let file_name = file.file_name()?.to_str()?;
    let name = file_name.strip_suffix(NETZONE_SUFFIX)?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}
