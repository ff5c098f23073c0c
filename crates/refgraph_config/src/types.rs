//! Manifest types deserialized from `refgraph.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The top-level manifest.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Metadata cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Metadata images on disk, by name.
    #[serde(default)]
    pub images: BTreeMap<String, ImageConfig>,
    /// Compilations, by name.
    #[serde(default)]
    pub compilations: BTreeMap<String, CompilationConfig>,
}

/// Project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description.
    #[serde(default)]
    pub description: String,
}

/// Metadata cache settings.
#[derive(Debug, Default, Deserialize)]
pub struct CacheConfig {
    /// Period of the background compaction sweep; none when absent.
    #[serde(default)]
    pub compaction_interval_ms: Option<u64>,
}

/// A metadata image on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Path, relative to the manifest's directory.
    pub path: String,
    /// Whether the image is an assembly or a standalone module.
    #[serde(default)]
    pub kind: ImageKindConfig,
    /// Extern aliases attached to references to this image.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub aliases: Vec<String>,
    /// Whether references embed interop types.
    #[serde(default)]
    pub embed_interop_types: bool,
}

/// Image kind as written in the manifest.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageKindConfig {
    /// An assembly with a manifest module.
    #[default]
    Assembly,
    /// A module linked into the referencing assembly.
    Module,
}

/// A compilation.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilationConfig {
    /// Own assembly name; defaults to the compilation's table name.
    #[serde(default)]
    pub assembly_name: Option<String>,
    /// Own assembly version, `major[.minor[.build[.revision]]]`.
    #[serde(default = "default_version")]
    pub version: String,
    /// Own assembly culture.
    #[serde(default)]
    pub culture: Option<String>,
    /// Own assembly public key token, 16 hex digits.
    #[serde(default)]
    pub public_key_token: Option<String>,
    /// Which non-public metadata is imported from references.
    #[serde(default)]
    pub import: ImportLevel,
    /// Image or compilation names, in reference order.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub references: Vec<String>,
    /// Declared types.
    #[serde(default)]
    pub types: Vec<TypeConfig>,
}

fn default_version() -> String {
    "1.0.0.0".to_string()
}

/// Metadata import visibility.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportLevel {
    /// Public types and members only.
    #[default]
    Public,
    /// Public and internal.
    Internal,
    /// Everything.
    All,
}

/// Declared visibility.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessibilityConfig {
    /// Visible everywhere.
    #[default]
    Public,
    /// Visible inside the assembly.
    Internal,
    /// Visible inside the declaring type.
    Private,
}

/// A declared type.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeConfig {
    /// Dotted namespace.
    #[serde(default)]
    pub namespace: String,
    /// Simple name.
    pub name: String,
    /// Declared visibility.
    #[serde(default)]
    pub accessibility: AccessibilityConfig,
    /// Type parameter names.
    #[serde(default)]
    pub type_parameters: Vec<String>,
    /// Base type string.
    #[serde(default)]
    pub base: Option<String>,
    /// Fields.
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    /// Methods.
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

/// A declared field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// Field name.
    pub name: String,
    /// Type string.
    #[serde(rename = "type")]
    pub ty: String,
    /// Declared visibility.
    #[serde(default)]
    pub accessibility: AccessibilityConfig,
}

/// A declared method.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodConfig {
    /// Method name.
    pub name: String,
    /// Return type string; none for a method returning nothing.
    #[serde(default)]
    pub returns: Option<String>,
    /// Method type parameter names.
    #[serde(default)]
    pub type_parameters: Vec<String>,
    /// Whether the method is static.
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Declared visibility.
    #[serde(default)]
    pub accessibility: AccessibilityConfig,
    /// Parameters.
    #[serde(default)]
    pub params: Vec<ParamConfig>,
}

/// A declared parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamConfig {
    /// Parameter name.
    pub name: String,
    /// Type string.
    #[serde(rename = "type")]
    pub ty: String,
}

/// Accepts `aliases = "A"` as well as `aliases = ["A", "B"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut names = Vec::new();
            while let Some(name) = seq.next_element::<String>()? {
                names.push(name);
            }
            Ok(names)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
