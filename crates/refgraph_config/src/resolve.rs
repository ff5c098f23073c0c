//! Turning a validated manifest into compilations ready to build.

use crate::error::ConfigError;
use crate::types::{
    AccessibilityConfig, CompilationConfig, ImageKindConfig, ImportLevel, MethodConfig,
    ProjectConfig, TypeConfig,
};
use refgraph_common::{PublicKeyToken, Version};
use refgraph_metadata::{Accessibility, FieldDef, ImageKind, MethodDef, TypeDef, TypeRef};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One entry of a resolved compilation's reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// A metadata image on disk.
    Image {
        /// Manifest name of the image.
        name: String,
        /// Absolute or manifest-relative path joined onto the base directory.
        path: PathBuf,
        /// Assembly or module.
        kind: ImageKind,
        /// Extern aliases.
        aliases: Vec<String>,
        /// Whether interop types are embedded.
        embed_interop_types: bool,
    },
    /// Another compilation of the manifest, built earlier in build order.
    Compilation {
        /// Manifest name of the compilation.
        name: String,
    },
}

/// A compilation with every string field parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCompilation {
    /// Manifest name.
    pub name: String,
    /// Own assembly name.
    pub assembly_name: String,
    /// Own assembly version.
    pub version: Version,
    /// Own assembly culture; empty for neutral.
    pub culture: String,
    /// Own assembly public key token.
    pub public_key_token: Option<PublicKeyToken>,
    /// Metadata import visibility.
    pub import: ImportLevel,
    /// References in manifest order.
    pub references: Vec<ResolvedReference>,
    /// Declared types.
    pub types: Vec<TypeDef>,
}

/// Every compilation of a manifest, dependencies first.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProject {
    /// Project name.
    pub name: String,
    /// Background compaction period, if configured.
    pub compaction_interval: Option<Duration>,
    /// Compilations in build order.
    pub compilations: Vec<ResolvedCompilation>,
}

/// Resolves a manifest whose image paths are relative to `base_dir`.
pub fn resolve_project(config: &ProjectConfig, base_dir: &Path) -> Result<ResolvedProject, ConfigError> {
    let compilations = build_order(config)?
        .into_iter()
        .map(|name| resolve_compilation(config, &name, &config.compilations[&name], base_dir))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedProject {
        name: config.project.name.clone(),
        compaction_interval: config.cache.compaction_interval_ms.map(Duration::from_millis),
        compilations,
    })
}

fn resolve_compilation(
    config: &ProjectConfig,
    name: &str,
    compilation: &CompilationConfig,
    base_dir: &Path,
) -> Result<ResolvedCompilation, ConfigError> {
    let references = compilation
        .references
        .iter()
        .map(|reference| match config.images.get(reference) {
            Some(image) => ResolvedReference::Image {
                name: reference.clone(),
                path: base_dir.join(&image.path),
                kind: match image.kind {
                    ImageKindConfig::Assembly => ImageKind::Assembly,
                    ImageKindConfig::Module => ImageKind::Module,
                },
                aliases: image.aliases.clone(),
                embed_interop_types: image.embed_interop_types,
            },
            None => ResolvedReference::Compilation {
                name: reference.clone(),
            },
        })
        .collect();
    let types = compilation
        .types
        .iter()
        .map(resolve_type_def)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedCompilation {
        name: name.to_string(),
        assembly_name: compilation.assembly_name.clone().unwrap_or_else(|| name.to_string()),
        version: compilation.version.parse::<Version>()?,
        culture: compilation.culture.clone().unwrap_or_default(),
        public_key_token: compilation
            .public_key_token
            .as_deref()
            .map(str::parse::<PublicKeyToken>)
            .transpose()?,
        import: compilation.import,
        references,
        types,
    })
}

fn accessibility(config: AccessibilityConfig) -> Accessibility {
    match config {
        AccessibilityConfig::Public => Accessibility::Public,
        AccessibilityConfig::Internal => Accessibility::Internal,
        AccessibilityConfig::Private => Accessibility::Private,
    }
}

fn resolve_type_def(config: &TypeConfig) -> Result<TypeDef, ConfigError> {
    let mut def = TypeDef::new(&config.namespace, &config.name)
        .with_accessibility(accessibility(config.accessibility));
    for parameter in &config.type_parameters {
        def = def.type_param(parameter);
    }
    if let Some(base) = &config.base {
        def = def.with_base(parse_type(base)?);
    }
    for field in &config.fields {
        def.fields.push(FieldDef {
            name: field.name.clone(),
            accessibility: accessibility(field.accessibility),
            ty: parse_type(&field.ty)?,
        });
    }
    for method in &config.methods {
        def = def.with_method(resolve_method(method)?);
    }
    Ok(def)
}

fn resolve_method(config: &MethodConfig) -> Result<MethodDef, ConfigError> {
    let mut method = MethodDef::new(&config.name).with_accessibility(accessibility(config.accessibility));
    if config.is_static {
        method = method.static_method();
    }
    for parameter in &config.type_parameters {
        method = method.type_param(parameter);
    }
    for param in &config.params {
        method = method.param(&param.name, parse_type(&param.ty)?);
    }
    if let Some(returns) = &config.returns {
        method = method.returns(parse_type(returns)?);
    }
    Ok(method)
}

/// Orders compilations so every compilation follows the compilations it
/// references. Ties keep name order.
pub fn build_order(config: &ProjectConfig) -> Result<Vec<String>, ConfigError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        name: &'a str,
        config: &'a ProjectConfig,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(ConfigError::ReferenceCycle(cycle));
            }
            None => {}
        }
        let Some(compilation) = config.compilations.get(name) else {
            return Ok(());
        };
        marks.insert(name, Mark::Visiting);
        path.push(name);
        for reference in &compilation.references {
            if config.compilations.contains_key(reference) {
                visit(reference, config, marks, path, order)?;
            }
        }
        path.pop();
        marks.insert(name, Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut order = Vec::with_capacity(config.compilations.len());
    for name in config.compilations.keys() {
        visit(name, config, &mut marks, &mut Vec::new(), &mut order)?;
    }
    Ok(order)
}

/// Parses a type string.
///
/// Grammar: `!N` is a type parameter of the enclosing type, `!!N` one of the
/// enclosing method; otherwise a dotted name (the last segment is the type
/// name) with optional `<A, B>` arguments, followed by any number of `[]`.
/// Names resolve like source declarations: own types first, then references.
pub fn parse_type(text: &str) -> Result<TypeRef, ConfigError> {
    let mut parser = TypeParser { text, pos: 0 };
    let ty = parser.parse()?;
    parser.skip_ws();
    if parser.pos != text.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(ty)
}

struct TypeParser<'a> {
    text: &'a str,
    pos: usize,
}

impl TypeParser<'_> {
    fn error(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidType {
            text: self.text.to_string(),
            reason: format!("{reason} at offset {}", self.pos),
        }
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn index(&mut self) -> Result<u16, ConfigError> {
        let digits = self.rest().chars().take_while(char::is_ascii_digit).count();
        let value = self.rest()[..digits]
            .parse()
            .map_err(|_| self.error("expected a parameter index"))?;
        self.pos += digits;
        Ok(value)
    }

    fn parse(&mut self) -> Result<TypeRef, ConfigError> {
        let mut ty = if self.eat("!!") {
            TypeRef::method_param(self.index()?)
        } else if self.eat("!") {
            TypeRef::type_param(self.index()?)
        } else {
            self.named()?
        };
        while self.eat("[") {
            if !self.eat("]") {
                return Err(self.error("expected `]`"));
            }
            ty = ty.array();
        }
        Ok(ty)
    }

    fn named(&mut self) -> Result<TypeRef, ConfigError> {
        self.skip_ws();
        let length = self
            .rest()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
            .map(char::len_utf8)
            .sum::<usize>();
        let text = self.text;
        let dotted = &text[self.pos..self.pos + length];
        if dotted.is_empty() || dotted.starts_with('.') || dotted.ends_with('.') || dotted.contains("..") {
            return Err(self.error("expected a type name"));
        }
        self.pos += length;
        let (namespace, name) = dotted.rsplit_once('.').unwrap_or(("", dotted));
        let mut ty = TypeRef::unqualified(namespace, name);
        if self.eat("<") {
            let mut args = vec![self.parse()?];
            while self.eat(",") {
                args.push(self.parse()?);
            }
            if !self.eat(">") {
                return Err(self.error("expected `>`"));
            }
            ty = ty.with_args(args);
        }
        Ok(ty)
    }
}
