//! Include Resolver and Dependency Graph
//!
//! Extracts `#include` directives directly from raw source text (independent
//! of the AST — see `ast.rs`'s doc comment), resolves them through an
//! ordered search-path list, and orders files so dependencies come first
//! (§4.1). Headers this compiler generated are skipped for symbol
//! collection but still participate in the graph.

use crate::diagnostics::DiagnosticSink;
use crate::fs::FileSystem;
use crate::header_parser::is_generated_header;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    /// `#include "local.h"`
    Local,
    /// `#include <system.h>`
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRef {
    pub target: String,
    pub kind: IncludeKind,
}

/// Extracts every `#include` from raw source text, in source order.
pub fn extract_includes(source: &str) -> Vec<IncludeRef> {
    let mut includes = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("#include") else {
            continue;
        };
        let rest = rest.trim_start();
        if let Some(inner) = rest.strip_prefix('"').and_then(|r| r.split_once('"')) {
            includes.push(IncludeRef { target: inner.0.to_string(), kind: IncludeKind::Local });
        } else if let Some(inner) = rest.strip_prefix('<').and_then(|r| r.split_once('>')) {
            includes.push(IncludeRef { target: inner.0.to_string(), kind: IncludeKind::System });
        }
    }
    includes
}

/// Resolves `#include` targets against an ordered list of search directories:
/// the including file's own directory, then each directory in `search_paths`
/// in order. Returns the first existing match.
pub fn resolve_include(
    fs: &dyn FileSystem,
    referencing_file: &Path,
    include: &IncludeRef,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = referencing_file.parent() {
        candidates.push(dir.join(&include.target));
    }
    for dir in search_paths {
        candidates.push(dir.join(&include.target));
    }
    candidates.into_iter().find(|p| fs.is_file(p))
}

/// A dependency graph over resolved file paths: `dependent -> [dependency]`.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    edges: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn add_node(&mut self, file: PathBuf) {
        self.edges.entry(file).or_default();
    }

    pub fn add_edge(&mut self, dependent: PathBuf, dependency: PathBuf) {
        self.edges.entry(dependent).or_default().push(dependency.clone());
        self.edges.entry(dependency).or_default();
    }

    /// Reverse-topological order: dependencies before dependents. Falls
    /// back to insertion order plus a warning on a cycle (§4.1).
    pub fn order(&self, sink: &mut DiagnosticSink) -> Vec<PathBuf> {
        let mut visited: HashSet<&PathBuf> = HashSet::new();
        let mut in_progress: HashSet<&PathBuf> = HashSet::new();
        let mut out = Vec::new();
        let mut had_cycle = false;

        let mut nodes: Vec<&PathBuf> = self.edges.keys().collect();
        nodes.sort();

        for start in &nodes {
            if visited.contains(*start) {
                continue;
            }
            let mut stack = vec![(*start, 0usize)];
            let mut path: Vec<&PathBuf> = Vec::new();
            while let Some((node, child_idx)) = stack.pop() {
                if child_idx == 0 {
                    if in_progress.contains(node) {
                        if !had_cycle {
                            sink.warn_cycle(&describe_cycle(&path, node));
                            had_cycle = true;
                        }
                        continue;
                    }
                    if visited.contains(node) {
                        continue;
                    }
                    in_progress.insert(node);
                    path.push(node);
                }
                let deps = self.edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
                if child_idx < deps.len() {
                    stack.push((node, child_idx + 1));
                    stack.push((&deps[child_idx], 0));
                } else {
                    in_progress.remove(node);
                    path.pop();
                    if visited.insert(node) {
                        out.push(node.clone());
                    }
                }
            }
        }
        out
    }
}

fn describe_cycle(path: &[&PathBuf], closing: &Path) -> String {
    let mut parts: Vec<String> = path.iter().map(|p| p.display().to_string()).collect();
    parts.push(closing.display().to_string());
    parts.join(" -> ")
}

/// Resolves the include graph for a set of already-known source files,
/// reading each to extract its `#include`s, and returns the dependency
/// order (dependencies first, per §4.1/§8).
pub struct Resolver<'a> {
    fs: &'a dyn FileSystem,
    search_paths: Vec<PathBuf>,
}

impl<'a> Resolver<'a> {
    pub fn new(fs: &'a dyn FileSystem, search_paths: Vec<PathBuf>) -> Self {
        Resolver { fs, search_paths }
    }

    /// Walks the include graph starting from `roots`, returning the
    /// dependency-ordered file list plus the diagnostics produced along the
    /// way (unresolved local includes, unreadable files, cycles).
    pub fn resolve(&self, roots: &[PathBuf]) -> (Vec<PathBuf>, DiagnosticSink) {
        let mut sink = DiagnosticSink::new();
        let mut graph = DependencyGraph::new();
        let mut seen = HashSet::new();
        let mut queue: Vec<PathBuf> = roots.to_vec();

        while let Some(file) = queue.pop() {
            if !seen.insert(file.clone()) {
                continue;
            }
            graph.add_node(file.clone());
            let Ok(source) = self.fs.read(&file) else {
                continue; // unreadable files are warnings at the orchestrator layer, not here
            };
            for include in extract_includes(&source) {
                match resolve_include(self.fs, &file, &include, &self.search_paths) {
                    Some(resolved) => {
                        graph.add_edge(file.clone(), resolved.clone());
                        if !seen.contains(&resolved) {
                            queue.push(resolved);
                        }
                    }
                    None => {
                        if include.kind == IncludeKind::Local {
                            sink.warn_unresolved_include(&file, &include.target);
                        }
                    }
                }
            }
        }

        let order = graph.order(&mut sink);
        (order, sink)
    }
}

/// True when a header's contents were generated by this compiler and
/// should be skipped for symbol collection (§4.1) while still counting
/// toward the dependency graph.
pub fn is_skippable_for_symbols(fs: &dyn FileSystem, path: &Path) -> bool {
    fs.read(path).map(|src| is_generated_header(&src)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn extracts_local_and_system_includes() {
        let src = "#include \"a.cnx\"\n#include <stdint.h>\nvoid main() {}\n";
        let includes = extract_includes(src);
        assert_eq!(includes.len(), 2);
        assert_eq!(includes[0].kind, IncludeKind::Local);
        assert_eq!(includes[1].kind, IncludeKind::System);
    }

    #[test]
    fn dependency_order_places_dependencies_first() {
        let fs = MockFileSystem::new()
            .with_file("/proj/a.cnx", "#include \"b.cnx\"\n")
            .with_file("/proj/b.cnx", "#include \"c.cnx\"\n")
            .with_file("/proj/c.cnx", "void main() {}\n");
        let resolver = Resolver::new(&fs, vec![]);
        let (order, sink) = resolver.resolve(&[PathBuf::from("/proj/a.cnx")]);
        assert!(!sink.has_errors());
        let pos = |name: &str| order.iter().position(|p| p.ends_with(name)).unwrap();
        assert!(pos("c.cnx") < pos("b.cnx"));
        assert!(pos("b.cnx") < pos("a.cnx"));
    }

    #[test]
    fn unresolved_local_include_warns() {
        let fs = MockFileSystem::new().with_file("/proj/a.cnx", "#include \"missing.cnx\"\n");
        let resolver = Resolver::new(&fs, vec![]);
        let (_, sink) = resolver.resolve(&[PathBuf::from("/proj/a.cnx")]);
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn unresolved_system_include_is_silent() {
        let fs = MockFileSystem::new().with_file("/proj/a.cnx", "#include <missing.h>\n");
        let resolver = Resolver::new(&fs, vec![]);
        let (_, sink) = resolver.resolve(&[PathBuf::from("/proj/a.cnx")]);
        assert_eq!(sink.warnings().count(), 0);
    }

    #[test]
    fn cycle_falls_back_and_warns() {
        let fs = MockFileSystem::new()
            .with_file("/proj/a.cnx", "#include \"b.cnx\"\n")
            .with_file("/proj/b.cnx", "#include \"a.cnx\"\n");
        let resolver = Resolver::new(&fs, vec![]);
        let (order, sink) = resolver.resolve(&[PathBuf::from("/proj/a.cnx")]);
        assert_eq!(order.len(), 2);
        assert_eq!(sink.warnings().count(), 1);
    }

    #[test]
    fn search_paths_are_consulted_in_order() {
        let fs = MockFileSystem::new()
            .with_file("/proj/a.cnx", "#include \"util.h\"\n")
            .with_file("/vendor/util.h", "// Generated by cnextc\n");
        let resolver = Resolver::new(&fs, vec![PathBuf::from("/vendor")]);
        let (order, sink) = resolver.resolve(&[PathBuf::from("/proj/a.cnx")]);
        assert_eq!(sink.warnings().count(), 0);
        assert!(order.iter().any(|p| p.ends_with("util.h")));
    }
}
