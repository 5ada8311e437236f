//! Library catalog — the static list of known libraries (`idlib.toml`)
//!
//! Declares each library's repository location, whether its entire history
//! is indexed or only a curated file list, and which libraries are known to
//! vendor copies of which others. Loaded once per run; validated for *all*
//! libraries before any indexing work starts, so a misconfigured entry can
//! never leave the index partially updated.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::vcs::GitRepo;
use crate::{IdlibError, IdlibResult};

/// One known library and how to fingerprint it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDescriptor {
    /// Unique name; also the default repository directory name.
    pub name: String,

    /// Repository checkout. Defaults to `<library_root>/<name>`.
    #[serde(default)]
    pub repo: Option<PathBuf>,

    /// Index the entire reachable history instead of a curated file list.
    #[serde(default)]
    pub full_history: bool,

    /// Files of interest for sparse indexing. Literal paths or glob
    /// patterns, resolved against the current tree at index time.
    #[serde(default)]
    pub files: Vec<String>,

    /// Upstream remote, recorded in the index for reference only.
    #[serde(default)]
    pub git_remote: Option<String>,

    /// One-line summary, recorded in the index for reference only.
    #[serde(default)]
    pub summary: Option<String>,
}

impl LibraryDescriptor {
    /// Declared file entries that are literal paths (no glob metacharacters).
    /// These must exist in the current tree for the catalog to validate.
    pub fn literal_files(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|f| !f.contains(['*', '?', '[', '{']))
    }
}

/// The full catalog: library list plus declared embedding relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Directory holding one checkout per library.
    #[serde(default = "default_library_root")]
    pub library_root: PathBuf,

    #[serde(default, rename = "library")]
    pub libraries: Vec<LibraryDescriptor>,

    /// Declared embedding relations: `outer = ["inner", ...]` means the
    /// outer library is known to vendor a copy of each inner one. Directed,
    /// many-to-many, and never expanded transitively.
    #[serde(default)]
    pub embedded: BTreeMap<String, Vec<String>>,
}

fn default_library_root() -> PathBuf {
    PathBuf::from("libraries")
}

impl Catalog {
    pub fn load(path: &Path) -> IdlibResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            IdlibError::Configuration(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> IdlibResult<Self> {
        let catalog: Catalog = toml::from_str(text)?;
        let mut seen = HashSet::new();
        for lib in &catalog.libraries {
            if !seen.insert(lib.name.as_str()) {
                return Err(IdlibError::Configuration(format!(
                    "duplicate library name in catalog: {}",
                    lib.name
                )));
            }
        }
        Ok(catalog)
    }

    /// Repository checkout path for a library.
    pub fn repo_path(&self, lib: &LibraryDescriptor) -> PathBuf {
        lib.repo
            .clone()
            .unwrap_or_else(|| self.library_root.join(&lib.name))
    }

    /// The libraries to operate on, optionally restricted to one name.
    pub fn select<'a>(
        &'a self,
        only: Option<&str>,
    ) -> IdlibResult<Vec<&'a LibraryDescriptor>> {
        let selected: Vec<&LibraryDescriptor> = match only {
            Some(name) => self.libraries.iter().filter(|l| l.name == name).collect(),
            None => self.libraries.iter().collect(),
        };
        if selected.is_empty() {
            return Err(IdlibError::Configuration(match only {
                Some(name) => format!("no library named {name:?} in catalog"),
                None => "catalog declares no libraries".to_string(),
            }));
        }
        Ok(selected)
    }

    /// Declared embedding edges as `(outer, inner)` pairs.
    pub fn embedding_edges(&self) -> Vec<(&str, &str)> {
        self.embedded
            .iter()
            .flat_map(|(outer, inners)| {
                inners.iter().map(move |inner| (outer.as_str(), inner.as_str()))
            })
            .collect()
    }

    /// Pre-flight check for every selected library: the repository must
    /// exist, have a clean work tree, and contain every declared literal
    /// path. All problems are collected and reported together; any problem
    /// aborts before a single record is written.
    pub fn validate(&self, libs: &[&LibraryDescriptor]) -> IdlibResult<()> {
        let mut problems = Vec::new();

        for lib in libs {
            let repo_path = self.repo_path(lib);
            tracing::info!("checking configuration for {}", lib.name);

            let repo = match GitRepo::open(&repo_path) {
                Ok(repo) => repo,
                Err(e) => {
                    problems.push(format!("{}: {e}", lib.name));
                    continue;
                }
            };

            match repo.is_modified() {
                Ok(true) => {
                    problems.push(format!("{}: work tree has uncommitted changes", lib.name))
                }
                Ok(false) => {}
                Err(e) => problems.push(format!("{}: {e}", lib.name)),
            }

            for file in lib.literal_files() {
                if !repo_path.join(file).is_file() {
                    problems.push(format!("{}: declared path does not exist: {file}", lib.name));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(IdlibError::Configuration(problems.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
library_root = "libraries"

[[library]]
name = "zlib"
files = ["deflate.c", "deflate.h", "inflate.c"]

[[library]]
name = "zstd"
files = ["lib/zstd.h", "lib/compress/*.c"]

[[library]]
name = "lua"
full_history = true
git_remote = "https://github.com/lua/lua"

[embedded]
zstd = ["zlib"]
"#;

    #[test]
    fn test_catalog_round_trip() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        assert_eq!(catalog.libraries.len(), 3);
        assert_eq!(catalog.library_root, PathBuf::from("libraries"));
        assert!(catalog.libraries[2].full_history);
        assert_eq!(catalog.embedding_edges(), vec![("zstd", "zlib")]);
    }

    #[test]
    fn test_literal_files_excludes_globs() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        let zstd = &catalog.libraries[1];
        let literals: Vec<&str> = zstd.literal_files().collect();
        assert_eq!(literals, vec!["lib/zstd.h"]);
    }

    #[test]
    fn test_select_by_name() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        let only = catalog.select(Some("zlib")).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "zlib");
        assert!(catalog.select(Some("nope")).is_err());
        assert_eq!(catalog.select(None).unwrap().len(), 3);
    }

    #[test]
    fn test_default_repo_path() {
        let catalog: Catalog = toml::from_str(CATALOG).unwrap();
        let zlib = &catalog.libraries[0];
        assert_eq!(catalog.repo_path(zlib), PathBuf::from("libraries/zlib"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dup = r#"
[[library]]
name = "zlib"

[[library]]
name = "zlib"
"#;
        assert!(Catalog::parse(dup).is_err());
        assert!(Catalog::parse(CATALOG).is_ok());
    }
}
