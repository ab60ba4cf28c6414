//! Loading one module's configuration files.

use canopy_core::{Error, ModuleSpec, Namespace, Result};
use canopy_directive::{apply, is_directive_file_name, DirectiveManifest, DISTINGUISHED_BASE};
use canopy_locale::{resolve, LocaleCandidate, LocaleCode};
use canopy_property::{xml, RootProperty};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads a module's configuration directory into root properties.
///
/// For every base name: pick the locale candidate, swap in a same-named
/// override from the persistence directory when one exists, parse, then
/// apply the module's directives. A file that fails to parse is skipped
/// with a warning unless it is the required `configuration` base, which
/// fails the whole module load.
#[derive(Debug, Default)]
pub struct ConfigurationReader;

impl ConfigurationReader {
    /// Load all roots for one module.
    pub fn load_module(
        &self,
        module: &ModuleSpec,
        locale: &LocaleCode,
    ) -> Result<Vec<RootProperty>> {
        let candidates = self.scan(module)?;
        let manifest = DirectiveManifest::load(&module.directives_dir)?;

        // Locale siblings compete within their own directory. Equal base
        // names in different directories produce separate roots sharing a
        // namespace, which the merge pass later collapses.
        let mut groups: BTreeMap<(PathBuf, String), Vec<LocaleCandidate>> = BTreeMap::new();
        for candidate in candidates {
            let dir = candidate
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            groups
                .entry((dir, candidate.base.clone()))
                .or_default()
                .push(candidate);
        }

        let mut roots = Vec::new();
        for ((_, base), group) in groups {
            let Some(chosen) = resolve(&group, locale) else {
                debug!(module = %module.name, base, "no candidate for locale; nothing loaded");
                continue;
            };

            // A user-local file at the mirrored relative path shadows the
            // shipped one.
            let mut source = chosen.path.clone();
            if let Ok(relative) = chosen.path.strip_prefix(&module.config_dir) {
                let override_path = module.persistence_dir.join(relative);
                if override_path.is_file() {
                    debug!(
                        module = %module.name,
                        file = %override_path.display(),
                        "using user override"
                    );
                    source = override_path;
                }
            }

            let namespace = Namespace::new(base.clone());
            let mut tree = match xml::parse_file(&source, &namespace) {
                Ok(tree) => tree,
                Err(e) if base == DISTINGUISHED_BASE => {
                    // The required base file is fatal for the module.
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        module = %module.name,
                        file = %source.display(),
                        error = %e,
                        "skipping unparseable configuration file"
                    );
                    continue;
                }
            };

            for directive in manifest.for_base(&base) {
                match apply(directive, &mut tree, &module.persistence_dir, None) {
                    Ok(true) => {
                        debug!(
                            module = %module.name,
                            directive = %directive.path.display(),
                            "directive mutated the tree"
                        );
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            module = %module.name,
                            directive = %directive.path.display(),
                            error = %e,
                            "skipping failed directive"
                        );
                    }
                }
            }

            roots.push(RootProperty::new(tree, module.name.clone(), Some(source)));
        }
        Ok(roots)
    }

    /// Locale candidates in the module's configuration directory tree.
    /// Directive and tracking names never compete as base files.
    fn scan(&self, module: &ModuleSpec) -> Result<Vec<LocaleCandidate>> {
        let dir = &module.config_dir;
        if !dir.is_dir() {
            debug!(module = %module.name, dir = %dir.display(), "no configuration directory");
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        let mut pending = vec![dir.clone()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current).map_err(|e| Error::io(&current, e))? {
                let entry = entry.map_err(|e| Error::io(&current, e))?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if is_directive_file_name(stem) {
                    debug!(file = %path.display(), "directive file in configuration directory; ignoring");
                    continue;
                }
                candidates.push(LocaleCandidate::from_path(path));
            }
        }
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(candidates)
    }
}
