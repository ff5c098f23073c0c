//! Compilation options and the process-wide symbol cache.

use std::fmt;
use std::sync::{Arc, OnceLock};

use refgraph_common::{AssemblyIdentity, PublicKeyToken, Version};
use refgraph_metadata::MetadataCache;
use refgraph_symbols::{ImportOptions, NativeAssembly};

use crate::reference::Reference;

/// The metadata cache specialised to native assembly wrappers.
pub type SymbolCache = MetadataCache<NativeAssembly>;

static SHARED_CACHE: OnceLock<Arc<SymbolCache>> = OnceLock::new();

/// The process-wide cache used by compilations that do not supply their own.
pub fn shared_cache() -> Arc<SymbolCache> {
    Arc::clone(SHARED_CACHE.get_or_init(|| Arc::new(SymbolCache::new())))
}

/// Supplies references for identities no explicit reference satisfies.
///
/// Each unresolved identity is offered at most once per resolve pass,
/// together with the identity of the unit that requested it.
pub trait MissingReferenceResolver: Send + Sync {
    /// Returns a reference that satisfies `requested`, if one is available.
    fn resolve_missing(
        &self,
        requesting: &AssemblyIdentity,
        requested: &AssemblyIdentity,
    ) -> Option<Reference>;
}

/// Settings that shape a compilation's own identity and its binding.
#[derive(Clone)]
pub struct CompilationOptions {
    version: Version,
    culture: String,
    public_key_token: Option<PublicKeyToken>,
    import: ImportOptions,
    cache: Arc<SymbolCache>,
    resolver: Option<Arc<dyn MissingReferenceResolver>>,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            version: Version::ZERO,
            culture: String::new(),
            public_key_token: None,
            import: ImportOptions::default(),
            cache: shared_cache(),
            resolver: None,
        }
    }
}

impl CompilationOptions {
    /// Default options bound to the shared cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the own assembly's version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Sets the own assembly's culture.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = culture.into();
        self
    }

    /// Sets the own assembly's public-key token.
    pub fn with_public_key_token(mut self, token: PublicKeyToken) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Sets which non-public metadata is imported.
    pub fn with_import(mut self, import: ImportOptions) -> Self {
        self.import = import;
        self
    }

    /// Uses `cache` instead of the shared one.
    pub fn with_cache(mut self, cache: Arc<SymbolCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Installs a resolver for identities left unresolved.
    pub fn with_resolver(mut self, resolver: Arc<dyn MissingReferenceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The own assembly's version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Metadata import visibility.
    pub fn import(&self) -> ImportOptions {
        self.import
    }

    /// The cache images and wrappers are shared through.
    pub fn cache(&self) -> &Arc<SymbolCache> {
        &self.cache
    }

    /// The missing-reference resolver, if any.
    pub fn resolver(&self) -> Option<&Arc<dyn MissingReferenceResolver>> {
        self.resolver.as_ref()
    }

    pub(crate) fn identity_for(&self, name: &str) -> AssemblyIdentity {
        let identity = AssemblyIdentity::new(name, self.version).with_culture(self.culture.clone());
        match self.public_key_token {
            Some(token) => identity.with_public_key_token(token),
            None => identity,
        }
    }
}

impl fmt::Debug for CompilationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationOptions")
            .field("version", &self.version)
            .field("culture", &self.culture)
            .field("public_key_token", &self.public_key_token)
            .field("import", &self.import)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_cache_is_one_instance() {
        assert!(Arc::ptr_eq(&shared_cache(), &shared_cache()));
        assert!(Arc::ptr_eq(CompilationOptions::new().cache(), &shared_cache()));
    }

    #[test]
    fn identity_reflects_options() {
        let token = PublicKeyToken::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let options = CompilationOptions::new()
            .with_version(Version::new(2, 1, 0, 0))
            .with_culture("en-US")
            .with_public_key_token(token);
        let identity = options.identity_for("App");
        assert_eq!(identity.name(), "App");
        assert_eq!(identity.version(), Version::new(2, 1, 0, 0));
        assert_eq!(identity.culture(), "en-US");
        assert_eq!(identity.public_key_token(), Some(token));
    }

    #[test]
    fn private_cache_is_used() {
        let cache = Arc::new(SymbolCache::new());
        let options = CompilationOptions::new().with_cache(Arc::clone(&cache));
        assert!(Arc::ptr_eq(options.cache(), &cache));
    }
}
