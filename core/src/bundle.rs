//! Single-header distribution of a C++ source tree.
//!
//! The tree is flattened into one folder, then either an umbrella header
//! (one `#include` per file) or a full amalgamation (every file's text inlined)
//! is emitted. Headers always come out in include order: a header is emitted
//! after every header it includes. Headers that include each other (guarded
//! mutual includes) form one group, emitted by file name.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap},
    fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use petgraph::{
    algo::{condensation, tarjan_scc},
    graph::{DiGraph, NodeIndex},
    Direction,
};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static LOCAL_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*#\s*include\s*"([^"]+)""#).expect("hardcoded regex")
});

static SYSTEM_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#\s*include\s*<([^>]+)>").expect("hardcoded regex"));

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("source directory {} does not exist", path.display())]
    MissingSource { path: PathBuf },
    #[error("failed to walk {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{name} exists at both {} and {}; flattening would overwrite one", first.display(), second.display())]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BundleError + '_ {
    move |source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    Header,
    Source,
    Other,
}

impl FileKind {
    pub fn classify(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("h" | "hpp" | "hh") => Self::Header,
            Some("cpp" | "cc" | "cxx") => Self::Source,
            _ => Self::Other,
        }
    }

    fn is_code(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: FileKind,
    /// Empty for files that are neither headers nor sources.
    pub text: String,
}

impl SourceFile {
    /// File names of local `#include "..."` directives, in order.
    pub fn local_includes(&self) -> Vec<String> {
        self.text
            .lines()
            .filter_map(|line| LOCAL_INCLUDE.captures(line))
            .map(|caps| include_file_name(&caps[1]))
            .collect()
    }

    pub fn system_includes(&self) -> Vec<String> {
        self.text
            .lines()
            .filter_map(|line| SYSTEM_INCLUDE.captures(line))
            .map(|caps| caps[1].trim().to_string())
            .collect()
    }
}

/// `#include "mdp/chain.h"` resolves to `chain.h` once the tree is flat.
fn include_file_name(include: &str) -> String {
    Path::new(include)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| include.to_string())
}

#[derive(Clone, Debug)]
pub struct SourceTree {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl SourceTree {
    /// Collect every file under `root`, sorted by file name. File names must
    /// be unique across the whole tree.
    pub fn scan(root: &Path) -> Result<Self, BundleError> {
        if !root.is_dir() {
            return Err(BundleError::MissingSource {
                path: root.to_path_buf(),
            });
        }

        let mut by_name: BTreeMap<String, SourceFile> = BTreeMap::new();
        let walker = WalkDir::new(root).sort_by(|a, b| a.file_name().cmp(b.file_name()));
        for entry in walker {
            let entry = entry.map_err(|source| BundleError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path().to_path_buf();
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(existing) = by_name.get(&name) {
                return Err(BundleError::DuplicateName {
                    name,
                    first: existing.path.clone(),
                    second: path,
                });
            }

            let kind = FileKind::classify(&path);
            let text = if kind.is_code() {
                fs::read_to_string(&path).map_err(io_error(&path))?
            } else {
                String::new()
            };
            by_name.insert(
                name.clone(),
                SourceFile {
                    name,
                    path,
                    kind,
                    text,
                },
            );
        }

        debug!(root = %root.display(), files = by_name.len(), "scanned source tree");
        Ok(Self {
            root: root.to_path_buf(),
            files: by_name.into_values().collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Drop a file by name, e.g. a previously generated umbrella header.
    pub fn exclude(&mut self, name: &str) {
        self.files.retain(|file| file.name != name);
    }

    /// Copy every file into `dest` without its directory structure.
    pub fn flatten_into(&self, dest: &Path) -> Result<Vec<PathBuf>, BundleError> {
        fs::create_dir_all(dest).map_err(io_error(dest))?;

        let mut copied = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let target = dest.join(&file.name);
            fs::copy(&file.path, &target).map_err(io_error(&file.path))?;
            copied.push(target);
        }

        info!(dest = %dest.display(), files = copied.len(), "flattened source tree");
        Ok(copied)
    }

    /// Include edges between the tree's headers, pointing from the included
    /// header to the one including it. Node weights index into the returned
    /// headers.
    fn include_graph(&self) -> (Vec<&SourceFile>, DiGraph<usize, ()>) {
        let headers: Vec<&SourceFile> = self
            .files
            .iter()
            .filter(|file| file.kind == FileKind::Header)
            .collect();

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..headers.len()).map(|idx| graph.add_node(idx)).collect();
        let index_of: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, file)| (file.name.as_str(), idx))
            .collect();

        for (idx, header) in headers.iter().enumerate() {
            for include in header.local_includes() {
                match index_of.get(include.as_str()) {
                    Some(&dep) if dep != idx => {
                        graph.update_edge(nodes[dep], nodes[idx], ());
                    }
                    Some(_) => {}
                    None => debug!(file = %header.name, include = %include, "include not in tree"),
                }
            }
        }

        (headers, graph)
    }

    /// Groups of headers that include each other, each sorted by name.
    pub fn include_cycles(&self) -> Vec<Vec<String>> {
        let (headers, graph) = self.include_graph();
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut names: Vec<String> = component
                    .into_iter()
                    .map(|node| headers[graph[node]].name.clone())
                    .collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Headers in include order (ties broken by name), then sources by name.
    ///
    /// Mutually including headers cannot be ordered among themselves; each
    /// such group is emitted as a block, sorted by name, after everything the
    /// group includes.
    pub fn dependency_order(&self) -> Vec<&SourceFile> {
        let (headers, graph) = self.include_graph();
        let condensed = condensation(graph, true);

        let groups: Vec<Vec<&SourceFile>> = condensed
            .node_indices()
            .map(|node| {
                let members = &condensed[node];
                let mut files: Vec<&SourceFile> = members.iter().map(|&idx| headers[idx]).collect();
                files.sort_by(|a, b| a.name.cmp(&b.name));
                files
            })
            .collect();

        let mut in_degree: Vec<usize> = condensed
            .node_indices()
            .map(|node| condensed.neighbors_directed(node, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<(&str, usize)>> = condensed
            .node_indices()
            .filter(|node| in_degree[node.index()] == 0)
            .map(|node| Reverse((groups[node.index()][0].name.as_str(), node.index())))
            .collect();

        let mut ordered = Vec::with_capacity(self.files.len());
        while let Some(Reverse((_, group))) = ready.pop() {
            let members = &groups[group];
            if members.len() > 1 {
                let names: Vec<&str> = members.iter().map(|file| file.name.as_str()).collect();
                warn!(files = ?names, "headers include each other; emitting them by name");
            }
            ordered.extend(members.iter().copied());

            for next in condensed.neighbors_directed(NodeIndex::new(group), Direction::Outgoing) {
                let next = next.index();
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse((groups[next][0].name.as_str(), next)));
                }
            }
        }

        ordered.extend(self.files.iter().filter(|file| file.kind == FileKind::Source));
        ordered
    }

    /// Umbrella header including every header and source in the tree.
    pub fn umbrella_header(&self, guard: &str) -> String {
        let mut contents = format!("#ifndef {guard}\n#define {guard}\n");
        for file in self.dependency_order() {
            contents.push_str(&format!("#include \"{}\"\n", file.name));
        }
        contents.push_str("#endif\n");
        contents
    }

    /// One file with system includes hoisted and every header and source
    /// inlined in include order.
    pub fn amalgamate(&self, guard: &str) -> String {
        let ordered = self.dependency_order();
        let known: BTreeSet<&str> = self.files.iter().map(|file| file.name.as_str()).collect();

        let system: BTreeSet<String> = ordered
            .iter()
            .flat_map(|file| file.system_includes())
            .collect();

        let mut contents = String::new();
        for include in &system {
            contents.push_str(&format!("#include <{include}>\n"));
        }
        contents.push_str(&format!("#ifndef {guard}\n#define {guard}\n"));

        for file in ordered {
            for line in file.text.lines() {
                if SYSTEM_INCLUDE.is_match(line) {
                    continue;
                }
                if let Some(caps) = LOCAL_INCLUDE.captures(line) {
                    if known.contains(include_file_name(&caps[1]).as_str()) {
                        continue;
                    }
                }
                contents.push_str(line);
                contents.push('\n');
            }
        }

        contents.push_str("#endif\n");
        contents
    }

    /// Flatten the tree into `dest` and write the umbrella header `name` next
    /// to the copies, plus the amalgamation when a path is given.
    ///
    /// All generated text is built and every output directory created before
    /// the first file is copied, so a bad output location leaves `dest`
    /// untouched. Returns the paths of the generated files.
    pub fn write_single_header(
        &self,
        dest: &Path,
        name: &str,
        guard: &str,
        amalgamation: Option<&Path>,
    ) -> Result<Vec<PathBuf>, BundleError> {
        let umbrella = self.umbrella_header(guard);
        let amalgamation = amalgamation.map(|path| (path, self.amalgamate(guard)));

        if let Some((path, _)) = &amalgamation {
            create_parent(path)?;
        }
        self.flatten_into(dest)?;

        let umbrella_path = dest.join(name);
        fs::write(&umbrella_path, umbrella).map_err(io_error(&umbrella_path))?;
        info!(path = %umbrella_path.display(), "wrote umbrella header");
        let mut written = vec![umbrella_path];

        if let Some((path, contents)) = amalgamation {
            fs::write(path, contents).map_err(io_error(path))?;
            info!(path = %path.display(), "wrote amalgamated header");
            written.push(path.to_path_buf());
        }

        Ok(written)
    }
}

fn create_parent(path: &Path) -> Result<(), BundleError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(io_error(parent)),
        None => Ok(()),
    }
}
