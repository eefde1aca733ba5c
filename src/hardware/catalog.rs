//! Hardware configuration parsing.
//!
//! The hardware document groups sensors by type under a `<hardware>` root:
//!
//! ```xml
//! <hardware>
//!     <lasers>
//!         <sensor name="H1214157">
//!             <enable>1</enable>
//!             <configFile>config/urg/H1214157.xml</configFile>
//!         </sensor>
//!     </lasers>
//!     <cameras>...</cameras>
//! </hardware>
//! ```
//!
//! A sensor's `configFile` may point at a separate document (relative to the
//! dataset root). With expansion enabled its contents are folded into the
//! property bag under `configFile/`, so `configFile/urg_datafile` addresses
//! `<urg_datafile>` inside that file.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Expected root element of a hardware configuration document.
pub const HARDWARE_ROOT: &str = "hardware";

const CONFIG_FILE_KEY: &str = "configFile";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("hardware config {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed hardware config {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("hardware config {} has root <{found}>, expected <hardware>", path.display())]
    UnexpectedRoot { path: PathBuf, found: String },

    #[error("sensor #{index} of type '{sensor_type}' has no name")]
    UnnamedSensor { sensor_type: String, index: usize },

    #[error("sensor name '{name}' of type '{sensor_type}' is not a single path component")]
    InvalidSensorName { sensor_type: String, name: String },

    #[error("sensor '{sensor}' of type '{sensor_type}' has no property '{property}'")]
    PropertyNotFound {
        sensor: String,
        sensor_type: String,
        property: String,
    },
}

/// Parsing options for [`SensorCatalog`].
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Fold referenced per-sensor config files into the property bag.
    pub expand_config_files: bool,

    /// Base directory for relative `configFile` references.
    pub base_dir: Option<PathBuf>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            expand_config_files: true,
            base_dir: None,
        }
    }
}

/// One physical sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    sensor_type: String,
    name: String,
    properties: BTreeMap<String, String>,
}

impl SensorDescriptor {
    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw property lookup by `/`-separated key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Sensors declared by a dataset's hardware configuration, in document order.
#[derive(Debug, Clone, Default)]
pub struct SensorCatalog {
    groups: Vec<(String, Vec<SensorDescriptor>)>,
}

impl SensorCatalog {
    /// Load the hardware config at `path`.
    pub fn load(path: impl AsRef<Path>, options: &CatalogOptions) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = read_document(path)?;
        Self::parse(path, &contents, options)
    }

    /// Parse hardware config text; `path` is used for error messages and as
    /// the fallback base for relative `configFile` references.
    pub fn parse(
        path: impl AsRef<Path>,
        xml: &str,
        options: &CatalogOptions,
    ) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let doc = parse_xml(path, xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != HARDWARE_ROOT {
            return Err(CatalogError::UnexpectedRoot {
                path: path.to_path_buf(),
                found: root.tag_name().name().to_string(),
            });
        }

        let base_dir = options
            .base_dir
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let mut groups: Vec<(String, Vec<SensorDescriptor>)> = Vec::new();
        for group in root.children().filter(|n| n.is_element()) {
            let sensor_type = group.tag_name().name().to_string();
            let mut sensors = Vec::new();

            for (index, node) in group.children().filter(|n| n.is_element()).enumerate() {
                let mut properties = BTreeMap::new();
                flatten(node, "", &mut properties);

                if !is_enabled(&properties) {
                    tracing::debug!("Skipping disabled {} sensor #{}", sensor_type, index);
                    continue;
                }

                let name = node
                    .attribute("name")
                    .map(str::to_string)
                    .or_else(|| properties.get("name").cloned())
                    .or_else(|| properties.get("serial").cloned())
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| CatalogError::UnnamedSensor {
                        sensor_type: sensor_type.clone(),
                        index,
                    })?;

                if !is_single_component(&name) {
                    return Err(CatalogError::InvalidSensorName {
                        sensor_type: sensor_type.clone(),
                        name,
                    });
                }

                if options.expand_config_files {
                    expand_config_file(&base_dir, &mut properties)?;
                }

                sensors.push(SensorDescriptor {
                    sensor_type: sensor_type.clone(),
                    name,
                    properties,
                });
            }

            match groups.iter_mut().find(|(t, _)| *t == sensor_type) {
                Some((_, existing)) => existing.extend(sensors),
                None => groups.push((sensor_type, sensors)),
            }
        }

        Ok(Self { groups })
    }

    /// Sensor type tags in document order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(t, _)| t.as_str())
    }

    /// Active sensors of a type, in document order. Empty when none are configured.
    pub fn sensors_of_type(&self, type_tag: &str) -> &[SensorDescriptor] {
        self.groups
            .iter()
            .find(|(t, _)| t == type_tag)
            .map(|(_, sensors)| sensors.as_slice())
            .unwrap_or(&[])
    }

    pub fn sensor(&self, type_tag: &str, name: &str) -> Option<&SensorDescriptor> {
        self.sensors_of_type(type_tag).iter().find(|s| s.name == name)
    }

    /// Resolve a property of `sensor`, which must be of type `type_tag`.
    ///
    /// `property_path` may use `/` or `.` as separator.
    pub fn property<'a>(
        &self,
        sensor: &'a SensorDescriptor,
        property_path: &str,
        type_tag: &str,
    ) -> Result<&'a str, CatalogError> {
        let key = property_path.replace('.', "/");
        let not_found = || CatalogError::PropertyNotFound {
            sensor: sensor.name.clone(),
            sensor_type: type_tag.to_string(),
            property: property_path.to_string(),
        };
        if sensor.sensor_type != type_tag {
            return Err(not_found());
        }
        sensor
            .get(key.trim_matches('/'))
            .filter(|v| !v.is_empty())
            .ok_or_else(not_found)
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, s)| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_document(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CatalogError::Missing(path.to_path_buf())
        } else {
            CatalogError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parse_xml<'x>(path: &Path, xml: &'x str) -> Result<roxmltree::Document<'x>, CatalogError> {
    roxmltree::Document::parse(xml).map_err(|source| CatalogError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Record every descendant element of `node` under `/`-joined keys.
///
/// Leaf elements store their trimmed text; repeated tags keep the first value.
fn flatten(node: roxmltree::Node<'_, '_>, prefix: &str, out: &mut BTreeMap<String, String>) {
    for child in node.children().filter(|n| n.is_element()) {
        let key = if prefix.is_empty() {
            child.tag_name().name().to_string()
        } else {
            format!("{}/{}", prefix, child.tag_name().name())
        };
        if child.children().any(|n| n.is_element()) {
            flatten(child, &key, out);
        } else {
            let text = child.text().unwrap_or("").trim().to_string();
            out.entry(key).or_insert(text);
        }
    }
}

/// Sensor names become directory names, so they must not carry separators
/// or relative components.
fn is_single_component(name: &str) -> bool {
    !name.contains(['/', '\\'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

fn is_enabled(properties: &BTreeMap<String, String>) -> bool {
    !matches!(
        properties.get("enable").map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("0") | Some("false") | Some("no")
    )
}

/// Replace a textual `configFile` reference with the flattened contents of
/// the referenced document. Inline `configFile` blocks are left as they are.
fn expand_config_file(
    base_dir: &Path,
    properties: &mut BTreeMap<String, String>,
) -> Result<(), CatalogError> {
    let Some(reference) = properties.get(CONFIG_FILE_KEY).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let path = base_dir.join(reference);
    let contents = read_document(&path)?;
    let doc = parse_xml(&path, &contents)?;

    let mut nested = BTreeMap::new();
    flatten(doc.root_element(), CONFIG_FILE_KEY, &mut nested);
    properties.remove(CONFIG_FILE_KEY);
    properties.insert(
        format!("{CONFIG_FILE_KEY}/path"),
        path.to_string_lossy().into_owned(),
    );
    for (key, value) in nested {
        properties.entry(key).or_insert(value);
    }
    Ok(())
}
