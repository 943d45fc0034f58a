//! Plugin registry for path-to-codec selection.
//!
//! The registry provides a centralized way to:
//! - Register codec plugins
//! - Select a plugin for a path by extension and content sniffing
//! - Look plugins up by format name
//!
//! # Architecture
//!
//! Built-in plugins are registered in [`PluginRegistry::with_builtins`], gated
//! by cargo features. [`PluginRegistry::global`] returns a shared instance of
//! that set. Callers that add their own plugins build a registry, register
//! into it and hand it to
//! [`ImageInput::open_in`](crate::ImageInput::open_in).
//!
//! # Example
//!
//! ```rust
//! use imgin_io::PluginRegistry;
//!
//! let registry = PluginRegistry::global();
//! for name in registry.format_names() {
//!     println!("Format: {name}");
//! }
//! assert!(registry.supports_extension("PPM"));
//! ```

use crate::detect::extension_of;
use crate::plugin::ImageInputPlugin;
use crate::{IoError, IoResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Plugin entry in the registry.
#[derive(Clone, Copy)]
pub struct PluginInfo {
    /// Format name (e.g. `"tiff"`), as reported by `format_name`.
    pub name: &'static str,
    /// File extensions without dots, lowercase.
    pub extensions: &'static [&'static str],
    /// Creates a closed plugin instance.
    pub create: fn() -> Box<dyn ImageInputPlugin>,
    /// Cheap content check, see [`ImageInputPlugin::valid_file`].
    pub valid_file: fn(&Path) -> bool,
}

impl std::fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInfo")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// Ordered set of codec plugins.
///
/// Selection walks plugins in registration order, so results do not depend
/// on hashing.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginInfo>,
    by_extension: HashMap<&'static str, usize>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the plugins enabled by cargo features.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "tiff")]
        registry.register(crate::tiff::plugin_info());

        #[cfg(feature = "hdr")]
        registry.register(crate::hdr::plugin_info());

        #[cfg(feature = "pnm")]
        registry.register(crate::pnm::plugin_info());

        #[cfg(feature = "null")]
        registry.register(crate::null::plugin_info());

        registry
    }

    /// Returns the shared registry of built-in plugins.
    pub fn global() -> Arc<PluginRegistry> {
        static INSTANCE: OnceLock<Arc<PluginRegistry>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| Arc::new(PluginRegistry::with_builtins()))
            .clone()
    }

    /// Registers a plugin. A plugin with the same name is replaced in place.
    pub fn register(&mut self, info: PluginInfo) {
        let index = match self.plugins.iter().position(|p| p.name == info.name) {
            Some(i) => {
                self.plugins[i] = info;
                i
            }
            None => {
                self.plugins.push(info);
                self.plugins.len() - 1
            }
        };
        self.by_extension.retain(|_, i| *i != index);
        for ext in info.extensions {
            self.by_extension.insert(*ext, index);
        }
    }

    /// Returns registered format names in registration order.
    pub fn format_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.iter().map(|p| p.name)
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Returns plugin info by format name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Returns plugin info by file extension (case-insensitive, no dot).
    pub fn get_by_extension(&self, ext: &str) -> Option<&PluginInfo> {
        let ext_lower = ext.to_lowercase();
        self.by_extension
            .get(ext_lower.as_str())
            .and_then(|&i| self.plugins.get(i))
    }

    /// Checks if an extension is supported.
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(ext.to_lowercase().as_str())
    }

    /// Finds the first plugin whose content check accepts `path`.
    pub fn detect(&self, path: &Path) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| (p.valid_file)(path))
    }

    /// Selects the plugin used to open `path`.
    ///
    /// Order: the forced format name if given; the extension's plugin if its
    /// content check passes; any plugin whose content check passes; the
    /// extension's plugin regardless, so its open reports the format error.
    pub fn select(&self, path: &Path, forced: Option<&str>) -> IoResult<&PluginInfo> {
        if let Some(name) = forced {
            return self
                .get(name)
                .ok_or_else(|| IoError::UnsupportedFormat(format!("no plugin named '{name}'")));
        }

        let by_ext = extension_of(path).and_then(|ext| self.get_by_extension(&ext));
        if let Some(info) = by_ext {
            if (info.valid_file)(path) {
                trace!(format = info.name, "selected by extension");
                return Ok(info);
            }
        }
        if let Some(info) = self.detect(path) {
            trace!(format = info.name, "selected by content");
            return Ok(info);
        }
        by_ext.ok_or_else(|| {
            IoError::UnsupportedFormat(format!(
                "no plugin recognizes '{}'",
                path.display()
            ))
        })
    }

    /// Creates a closed plugin for a format name or a path.
    pub fn create(&self, path_or_format: &str) -> IoResult<Box<dyn ImageInputPlugin>> {
        if let Some(info) = self.get(path_or_format) {
            return Ok((info.create)());
        }
        let info = self.select(Path::new(path_or_format), None)?;
        Ok((info.create)())
    }
}
