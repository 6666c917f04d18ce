//! External pattern resolution.
//!
//! Files living outside a theme directory are associated with a theme purely
//! by their file name: `{basename}.{themeName}.{extension}`. A configured
//! glob pattern such as `{cwd}/components/**/*` therefore gets the suffix
//! `.{themeName}.{extension}` appended before it is matched, so that
//! `button.dark.css` is picked up by the `dark` theme and `button.light.css`
//! is not.

use std::path::{Component, Path, PathBuf};

use glob::MatchOptions;
use themes_runtime::StyleRuntime;
use tracing::{debug, warn};

use crate::config::ThemeExtension;

/// Token expanded to the working directory at the start of a pattern.
pub const CWD_TOKEN: &str = "{cwd}";

/// Directories never searched for pattern matches.
const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];

/// Turns raw glob patterns into theme-qualified path lists.
#[derive(Debug, Clone)]
pub struct PatternResolver {
    cwd: PathBuf,
    root: PathBuf,
    theme_name: String,
    extension: ThemeExtension,
}

impl PatternResolver {
    pub fn new(
        cwd: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        theme_name: impl Into<String>,
        extension: ThemeExtension,
    ) -> Self {
        Self {
            cwd: cwd.into(),
            root: root.into(),
            theme_name: theme_name.into(),
            extension,
        }
    }

    /// Produce the pattern used for matching.
    ///
    /// `{cwd}` expands to the working directory and a leading `../` resolves
    /// against the theme root. With `add_suffix` the theme sub-extension and
    /// file extension are appended; without it the bare pattern is returned
    /// (used to derive watch roots).
    pub fn apply(&self, pattern: &str, add_suffix: bool) -> String {
        let mut resolved = if let Some(rest) = pattern.strip_prefix(CWD_TOKEN) {
            format!("{}{}", self.cwd.display(), rest)
        } else if pattern.starts_with("../") {
            normalize_path(&self.root.join(pattern))
                .to_string_lossy()
                .into_owned()
        } else {
            pattern.to_string()
        };

        if add_suffix {
            resolved.push('.');
            resolved.push_str(&self.theme_name);
            resolved.push('.');
            resolved.push_str(self.extension.as_str());
        }
        resolved
    }

    /// Resolve one pattern to the files it matches, in glob order.
    ///
    /// Invalid patterns and patterns matching nothing yield an empty list.
    pub fn resolve(&self, runtime: &dyn StyleRuntime, pattern: &str) -> Vec<PathBuf> {
        let applied = self.apply(pattern, true);
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let paths = match glob::glob_with(&applied, options) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(theme = %self.theme_name, pattern = %applied, error = %e, "Invalid glob pattern");
                return Vec::new();
            }
        };

        paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "Unreadable glob match skipped");
                    None
                }
            })
            .filter(|path| !is_ignored(path))
            .filter(|path| runtime.is_file(path).unwrap_or(false))
            .collect()
    }

    /// Resolve every pattern in declaration order, concatenating the matches.
    ///
    /// A file matched by two patterns appears twice.
    pub fn resolve_all(&self, runtime: &dyn StyleRuntime, patterns: &[String]) -> Vec<PathBuf> {
        patterns
            .iter()
            .flat_map(|pattern| self.resolve(runtime, pattern))
            .collect()
    }

    /// Directory to watch for a pattern: the bare pattern truncated before
    /// its first glob component (`/a/b/**/*` watches `/a/b`).
    pub fn watch_root(&self, pattern: &str) -> PathBuf {
        let bare = self.apply(pattern, false);
        let mut root = PathBuf::new();
        for component in Path::new(&bare).components() {
            let text = component.as_os_str().to_string_lossy();
            if text.contains(['*', '?', '[', '{']) {
                break;
            }
            root.push(component);
        }
        root
    }

    /// Check whether a changed file belongs to this resolver's theme.
    pub fn owns(&self, path: &Path) -> bool {
        self.extension.matches(path) && sub_extension(path) == Some(self.theme_name.as_str())
    }
}

/// The theme segment of `{basename}.{theme}.{ext}`, i.e. the segment right
/// before the extension. `None` for names with fewer than three segments.
pub fn sub_extension(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let mut segments = name.rsplit('.');
    let _extension = segments.next()?;
    let theme = segments.next()?;
    segments.next()?;
    Some(theme)
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => IGNORED_DIRS.iter().any(|ignored| name == *ignored),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use themes_runtime::NativeRuntime;

    fn resolver(cwd: &Path, root: &Path, name: &str) -> PatternResolver {
        PatternResolver::new(cwd, root, name, ThemeExtension::Css)
    }

    #[test]
    fn test_apply_appends_suffix() {
        let r = resolver(Path::new("/work"), Path::new("/work/themes/dark"), "dark");
        assert_eq!(
            r.apply("/work/components/**/*", true),
            "/work/components/**/*.dark.css"
        );
        assert_eq!(r.apply("/work/components/**/*", false), "/work/components/**/*");
    }

    #[test]
    fn test_apply_expands_cwd() {
        let r = resolver(Path::new("/work"), Path::new("/work/themes/dark"), "dark");
        assert_eq!(r.apply("{cwd}/pages/**/*", false), "/work/pages/**/*");
    }

    #[test]
    fn test_apply_parent_relative_to_root() {
        let r = resolver(Path::new("/elsewhere"), Path::new("/work/themes/dark"), "dark");
        assert_eq!(
            r.apply("../../components/**/*", true),
            "/work/components/**/*.dark.css"
        );
    }

    #[test]
    fn test_resolve_only_matches_theme_sub_extension() {
        let temp = TempDir::new().unwrap();
        let components = temp.path().join("components");
        fs::create_dir_all(components.join("button")).unwrap();
        fs::write(components.join("button/button.dark.css"), ".b{}").unwrap();
        fs::write(components.join("button/button.light.css"), ".b{}").unwrap();
        fs::write(components.join("button/button.dark.scss"), ".b{}").unwrap();

        let r = resolver(temp.path(), temp.path(), "dark");
        let files = r.resolve(&NativeRuntime::new(), &format!("{}/**/*", components.display()));

        assert_eq!(files, vec![components.join("button/button.dark.css")]);
    }

    #[test]
    fn test_resolve_ignores_node_modules() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/x.dark.css"), "").unwrap();
        fs::write(temp.path().join("y.dark.css"), "").unwrap();

        let r = resolver(temp.path(), temp.path(), "dark");
        let files = r.resolve(&NativeRuntime::new(), "{cwd}/**/*");

        assert_eq!(files, vec![temp.path().join("y.dark.css")]);
    }

    #[test]
    fn test_resolve_skips_directories_with_theme_suffix() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("legacy.dark.css")).unwrap();
        fs::write(temp.path().join("z.dark.css"), "").unwrap();

        let r = resolver(temp.path(), temp.path(), "dark");
        let files = r.resolve(&NativeRuntime::new(), "{cwd}/*");

        assert_eq!(files, vec![temp.path().join("z.dark.css")]);
    }

    #[test]
    fn test_resolve_invalid_pattern_is_empty() {
        let r = resolver(Path::new("/work"), Path::new("/work"), "dark");
        assert!(r.resolve(&NativeRuntime::new(), "/work/[unclosed").is_empty());
    }

    #[test]
    fn test_resolve_all_keeps_duplicates() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.dark.css"), "").unwrap();

        let r = resolver(temp.path(), temp.path(), "dark");
        let pattern = "{cwd}/*".to_string();
        let files = r.resolve_all(&NativeRuntime::new(), &[pattern.clone(), pattern]);

        assert_eq!(files.len(), 2);
        assert_eq!(files[0], files[1]);
    }

    #[test]
    fn test_watch_root_strips_glob() {
        let r = resolver(Path::new("/work"), Path::new("/work/themes/dark"), "dark");
        assert_eq!(r.watch_root("{cwd}/components/**/*"), PathBuf::from("/work/components"));
        assert_eq!(r.watch_root("/abs/pages/*"), PathBuf::from("/abs/pages"));
    }

    #[test]
    fn test_sub_extension() {
        assert_eq!(sub_extension(Path::new("button.dark.css")), Some("dark"));
        assert_eq!(sub_extension(Path::new("/x/my.button.dark.css")), Some("dark"));
        assert_eq!(sub_extension(Path::new("button.css")), None);
        assert_eq!(sub_extension(Path::new("button")), None);
    }

    #[test]
    fn test_owns() {
        let r = resolver(Path::new("/w"), Path::new("/w"), "dark");
        assert!(r.owns(Path::new("/w/c/button.dark.css")));
        assert!(!r.owns(Path::new("/w/c/button.light.css")));
        assert!(!r.owns(Path::new("/w/c/button.dark.scss")));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
