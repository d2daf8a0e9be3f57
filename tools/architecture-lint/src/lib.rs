//! Boundary lint for the `client` crate.
//!
//! `client/src` is split into three layers. `domain` holds the stores, value
//! types and ports. `inbound` is the terminal console and `outbound` is the
//! hosted HTTP backend. Every `.rs` file under those directories is parsed
//! and each path it mentions is checked against [`RULES`]:
//!
//! - `domain` may not reach either adapter layer, nor the HTTP, config or
//!   subscriber crates the binary wires in
//! - `inbound` may not reach `outbound` or talk HTTP itself
//! - `outbound` may not reach `inbound` or the binary's config crates
//!
//! Run it with `cargo run -p architecture-lint`.

use std::collections::BTreeSet;
use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use syn::visit::{self, Visit};

/// Library name of the linted crate, as seen from its tests and binary.
const CRATE_NAME: &str = "taskboard";

/// What one layer of `client/src` must not depend on.
struct LayerRule {
    layer: &'static str,
    sibling_layers: &'static [&'static str],
    crates: &'static [&'static str],
}

static RULES: [LayerRule; 3] = [
    LayerRule {
        layer: "domain",
        sibling_layers: &["inbound", "outbound"],
        crates: &[
            "clap",
            "color_eyre",
            "httpmock",
            "ortho_config",
            "reqwest",
            "tracing_subscriber",
            "url",
        ],
    },
    LayerRule {
        layer: "inbound",
        sibling_layers: &["outbound"],
        crates: &["httpmock", "reqwest"],
    },
    LayerRule {
        layer: "outbound",
        sibling_layers: &["inbound"],
        crates: &["clap", "color_eyre", "ortho_config"],
    },
];

/// A boundary crossing found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File path relative to `client/src`.
    pub file: Utf8PathBuf,
    /// Which rule was broken.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

/// Why a lint run did not pass.
#[derive(Debug)]
pub enum ArchitectureLintError {
    /// Walking or reading `client/src` failed.
    Io(io::Error),
    /// A file could not be attributed to a layer or parsed as Rust.
    Parse { file: Utf8PathBuf, message: String },
    /// The sources cross one or more layer boundaries.
    Violations(Vec<Violation>),
}

impl fmt::Display for ArchitectureLintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read client sources: {err}"),
            Self::Parse { file, message } => write!(f, "cannot lint {file}: {message}"),
            Self::Violations(violations) => {
                writeln!(f, "{} layer boundary violation(s):", violations.len())?;
                violations
                    .iter()
                    .try_for_each(|violation| writeln!(f, "  {violation}"))
            }
        }
    }
}

impl std::error::Error for ArchitectureLintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse { .. } | Self::Violations(_) => None,
        }
    }
}

impl From<io::Error> for ArchitectureLintError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// One Rust file handed to [`lint_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `client/src`; its first component names the layer.
    pub file: Utf8PathBuf,
    pub contents: String,
}

/// Lint the layer directories under `client_dir/src`.
pub fn lint_client_sources(client_dir: &Utf8Path) -> Result<(), ArchitectureLintError> {
    let src = Dir::open_ambient_dir(client_dir.join("src"), ambient_authority())?;
    let mut sources = Vec::new();
    for rule in &RULES {
        if src.is_dir(rule.layer) {
            read_sources(&src, Utf8Path::new(rule.layer), &mut sources)?;
        }
    }
    sources.sort_by(|left, right| left.file.cmp(&right.file));
    lint_sources(&sources)
}

/// Lint in-memory sources; paths are taken relative to `client/src`.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut violations = Vec::new();
    for source in sources {
        let rule = rule_for(&source.file).ok_or_else(|| ArchitectureLintError::Parse {
            file: source.file.clone(),
            message: "not under domain/, inbound/ or outbound/".to_owned(),
        })?;
        let syntax =
            syn::parse_file(&source.contents).map_err(|err| ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: err.to_string(),
            })?;
        violations.extend(check_file(&source.file, rule, &syntax));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArchitectureLintError::Violations(violations))
    }
}

fn rule_for(file: &Utf8Path) -> Option<&'static LayerRule> {
    let layer = file.components().next()?.as_str();
    RULES.iter().find(|rule| rule.layer == layer)
}

fn read_sources(
    src: &Dir,
    dir: &Utf8Path,
    sources: &mut Vec<LintSource>,
) -> Result<(), ArchitectureLintError> {
    for entry in src.read_dir(dir)? {
        let entry = entry?;
        let os_name = entry.file_name();
        let Some(name) = os_name.to_str() else {
            return Err(ArchitectureLintError::Parse {
                file: dir.join(os_name.to_string_lossy().as_ref()),
                message: "file name is not valid UTF-8".to_owned(),
            });
        };
        let path = dir.join(name);
        if entry.file_type()?.is_dir() {
            read_sources(src, &path, sources)?;
        } else if path.extension() == Some("rs") {
            let contents = src.read_to_string(&path)?;
            sources.push(LintSource {
                file: path,
                contents,
            });
        }
    }
    Ok(())
}

/// Where a path points, as far as layering is concerned.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    /// A top-level module of the linted crate.
    Module(&'a str),
    /// Another crate.
    Crate(&'a str),
}

fn target_of(segments: &[String]) -> Option<Target<'_>> {
    let first = segments.first()?.as_str();
    if RULES.iter().any(|rule| rule.layer == first) {
        return Some(Target::Module(first));
    }
    match first {
        "crate" | "self" | "super" => segments
            .iter()
            .map(String::as_str)
            .find(|segment| !matches!(*segment, "crate" | "self" | "super"))
            .map(Target::Module),
        CRATE_NAME => segments.get(1).map(|segment| Target::Module(segment.as_str())),
        other => Some(Target::Crate(other)),
    }
}

fn check_file(file: &Utf8Path, rule: &LayerRule, syntax: &syn::File) -> Vec<Violation> {
    let mut collector = PathCollector::default();
    collector.visit_file(syntax);

    let messages: BTreeSet<String> = collector
        .paths
        .iter()
        .filter_map(|segments| match target_of(segments)? {
            Target::Module(module) if rule.sibling_layers.contains(&module) => Some(format!(
                "{} module must not depend on crate::{module}",
                rule.layer
            )),
            Target::Crate(name) if rule.crates.contains(&name) => Some(format!(
                "{} module must not depend on external crate `{name}`",
                rule.layer
            )),
            Target::Module(_) | Target::Crate(_) => None,
        })
        .collect();

    messages
        .into_iter()
        .map(|message| Violation {
            file: file.to_owned(),
            message,
        })
        .collect()
}

/// Gathers `use` trees and qualified paths, flattened to segment lists.
///
/// Single-segment expression paths are skipped: they are local bindings or
/// items in scope, and a binding named like a crate is not a dependency.
#[derive(Default)]
struct PathCollector {
    paths: BTreeSet<Vec<String>>,
}

impl PathCollector {
    fn flatten_use(&mut self, tree: &syn::UseTree, prefix: &mut Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.flatten_use(&path.tree, prefix);
                prefix.pop();
            }
            syn::UseTree::Name(syn::UseName { ident })
            | syn::UseTree::Rename(syn::UseRename { ident, .. }) => {
                self.insert_with(prefix, ident.to_string());
            }
            syn::UseTree::Glob(_) => self.insert_with(prefix, "*".to_owned()),
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.flatten_use(item, prefix);
                }
            }
        }
    }

    fn insert_with(&mut self, prefix: &[String], last: String) {
        let mut segments = prefix.to_vec();
        segments.push(last);
        self.paths.insert(segments);
    }
}

impl<'ast> Visit<'ast> for PathCollector {
    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.flatten_use(&node.tree, &mut Vec::new());
    }

    fn visit_path(&mut self, node: &'ast syn::Path) {
        if node.segments.len() > 1 {
            self.paths.insert(
                node.segments
                    .iter()
                    .map(|segment| segment.ident.to_string())
                    .collect(),
            );
        }
        visit::visit_path(self, node);
    }
}
