//! Orchestrator / pipeline (§2 item 7, §5)
//!
//! Coordinates discovery → resolution → symbol collection (stage A) →
//! code + header generation (stage B). `compile_files` drives this over a
//! real (or mock) `FileSystem` and writes outputs back to disk ("files"
//! mode); `compile_sources` runs the identical stages over in-memory
//! source text and returns the generated text instead of writing it
//! ("source" mode, §5/§6). Both share `run`, which is agnostic to which
//! mode called it.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::ast::Program;
use crate::codegen::{self, CodeGenConfig};
use crate::codegen::atomics::TargetProfile;
use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, ErrorCode};
use crate::error::{CnxError, ResolveError, SymbolError};
use crate::fs::FileSystem;
use crate::header_gen;
use crate::header_parser::{self, HeaderSymbol};
use crate::parser::parse_source;
use crate::resolver::{self, Resolver};
use crate::symbols::{self, CodeGenSymbols};

const SOURCE_EXTENSIONS: &[&str] = &["cnx", "cnext"];
const NATIVE_EXTENSIONS: &[&str] = &["c", "cpp", "cc", "cxx", "c++", "h", "hpp"];

/// One `.cnx`/`.cnext` file's stage-B output.
pub struct CompiledFile {
    pub source_path: PathBuf,
    pub source_text: String,
    pub header_text: String,
}

#[derive(Default)]
pub struct PipelineResult {
    pub files: Vec<CompiledFile>,
    pub diagnostics: DiagnosticSink,
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| exts.contains(&e)).unwrap_or(false)
}

fn is_cnx_source(path: &Path) -> bool {
    has_extension(path, SOURCE_EXTENSIONS)
}

fn is_native(path: &Path) -> bool {
    has_extension(path, NATIVE_EXTENSIONS)
}

fn search_paths(config: &CompilerConfig) -> Vec<PathBuf> {
    let mut paths = config.include_dirs.clone();
    paths.push(config.base_path.join("include"));
    paths.push(config.base_path.join("src"));
    paths.push(config.base_path.join("lib"));
    paths
}

fn codegen_config(config: &CompilerConfig) -> CodeGenConfig {
    CodeGenConfig {
        cpp: config.cpp,
        debug: config.debug,
        target: TargetProfile::lookup(&config.target),
    }
}

/// Maps a symbol-collection error to the nearest code in the §7 taxonomy;
/// duplicate enum values and unknown bitmap backing types have no code of
/// their own there, so both fall back to E0500 ("unknown type" — the
/// closest existing bucket for a type/collection consistency failure).
fn symbol_error_code(err: &SymbolError) -> ErrorCode {
    match err {
        SymbolError::OverlappingBitmapFields { .. } => ErrorCode::E0421,
        SymbolError::UnknownBitmapBackingType { .. } | SymbolError::DuplicateEnumValue { .. } => ErrorCode::E0500,
    }
}

fn mirrored_output_path(source: &Path, base_path: &Path, out_dir: &Path, new_ext: &str) -> PathBuf {
    let rel = source.strip_prefix(base_path).unwrap_or(source);
    out_dir.join(rel).with_extension(new_ext)
}

fn header_extension(cpp: bool) -> &'static str {
    if cpp { "hpp" } else { "h" }
}

fn source_extension(cpp: bool) -> &'static str {
    if cpp { "cpp" } else { "c" }
}

/// Records the struct/class/opaque names a native header exposes into the
/// aggregated symbol table's `opaque_types` set so `header_gen.rs` can
/// forward-declare them (§2 item 3, §4.9).
fn record_opaque_types(symbols: &mut CodeGenSymbols, header_symbols: &header_parser::HeaderSymbols) {
    for sym in &header_symbols.symbols {
        if matches!(sym, HeaderSymbol::Struct { .. } | HeaderSymbol::Class { .. } | HeaderSymbol::Opaque { .. }) {
            symbols.opaque_types.insert(sym.name().to_string());
        }
    }
}

/// Runs stage A (resolve + collect across every file in dependency order)
/// then stage B (codegen + header generation per `.cnx`/`.cnext` file).
/// `roots` seeds the include graph; passing every discovered input file as
/// a root is harmless since the resolver dedups by resolved path.
pub fn run(fs: &dyn FileSystem, roots: &[PathBuf], config: &CompilerConfig) -> Result<PipelineResult, CnxError> {
    let mut sink = DiagnosticSink::new();
    let resolver = Resolver::new(fs, search_paths(config));
    let (ordered, resolve_sink) = resolver.resolve(roots);
    sink.extend(resolve_sink);

    let mut merged_symbols = CodeGenSymbols::default();
    let mut programs: HashMap<PathBuf, Program> = HashMap::new();
    let mut skip: Vec<PathBuf> = Vec::new();

    for path in &ordered {
        if is_native(path) {
            if !resolver::is_skippable_for_symbols(fs, path) {
                let source = fs.read(path).map_err(|source| ResolveError::Io { path: path.display().to_string(), source })?;
                record_opaque_types(&mut merged_symbols, &header_parser::parse_header(&source, path));
            }
            continue;
        }
        if !is_cnx_source(path) {
            continue;
        }

        let source = fs.read(path).map_err(|source| ResolveError::Io { path: path.display().to_string(), source })?;
        let program = match parse_source(&source, path) {
            Ok(p) => p,
            Err(err) => {
                sink.push(Diagnostic::error(ErrorCode::E0002, err.to_string()));
                skip.push(path.clone());
                continue;
            }
        };
        match symbols::collect_symbols(&program) {
            Ok(file_symbols) => merged_symbols.merge(file_symbols),
            Err(errors) => {
                for err in &errors {
                    sink.push(Diagnostic::error(symbol_error_code(err), err.to_string()));
                }
                skip.push(path.clone());
                continue;
            }
        }
        programs.insert(path.clone(), program);
    }

    let gen_config = codegen_config(config);
    let mut files = Vec::new();

    for path in &ordered {
        if !is_cnx_source(path) || skip.contains(path) {
            continue;
        }
        let program = &programs[path];
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let header_text = match header_gen::generate_header(program, &merged_symbols, &gen_config, stem, &path.display().to_string()) {
            Ok(text) => text,
            Err(err) => {
                sink.push(Diagnostic::error(ErrorCode::E0500, err.to_string()));
                continue;
            }
        };
        let body = match codegen::generate_source(program, &merged_symbols, &gen_config) {
            Ok(text) => text,
            Err(err) => {
                sink.push(err.into_diagnostic());
                continue;
            }
        };
        let header_file_name = format!("{stem}.{}", header_extension(config.cpp));
        let source_text = format!(
            "{}\n#include \"{header_file_name}\"\n\n{body}",
            header_gen::GENERATED_MARKER,
        );
        files.push(CompiledFile { source_path: path.clone(), source_text, header_text });
    }

    Ok(PipelineResult { files, diagnostics: sink })
}

/// Recursively collects every file under `path` matching an accepted
/// input extension (§6); `path` itself is returned if it is already such a
/// file.
fn discover_inputs(fs: &dyn FileSystem, path: &Path) -> io::Result<Vec<PathBuf>> {
    if fs.is_file(path) {
        return Ok(if is_cnx_source(path) || is_native(path) { vec![path.to_path_buf()] } else { Vec::new() });
    }
    let mut found = Vec::new();
    for entry in fs.readdir(path)? {
        if fs.is_directory(&entry) {
            found.extend(discover_inputs(fs, &entry)?);
        } else if is_cnx_source(&entry) || is_native(&entry) {
            found.push(entry);
        }
    }
    Ok(found)
}

/// "Files" mode (§5): discovers inputs under each of `inputs`, runs the
/// pipeline, and writes generated `.c`/`.cpp` and `.h`/`.hpp` text back to
/// disk, mirroring the input tree under `out_dir` (and `header_out_dir`, if
/// set) with `base_path` stripped (§6 "Persisted state").
pub fn compile_files(fs: &dyn FileSystem, inputs: &[PathBuf], config: &CompilerConfig) -> Result<DiagnosticSink, CnxError> {
    let mut roots = Vec::new();
    for input in inputs {
        roots.extend(discover_inputs(fs, input).map_err(|source| ResolveError::Io { path: input.display().to_string(), source })?);
    }

    let result = run(fs, &roots, config)?;

    for file in &result.files {
        let source_out = mirrored_output_path(&file.source_path, &config.base_path, &config.out_dir, source_extension(config.cpp));
        fs.write(&source_out, &file.source_text).map_err(|source| ResolveError::Io { path: source_out.display().to_string(), source })?;

        let header_out_dir = config.header_out_dir.as_deref().unwrap_or(&config.out_dir);
        let header_out = mirrored_output_path(&file.source_path, &config.base_path, header_out_dir, header_extension(config.cpp));
        fs.write(&header_out, &file.header_text).map_err(|source| ResolveError::Io { path: header_out.display().to_string(), source })?;
    }

    Ok(result.diagnostics)
}

/// "Source" mode (§5/§6): the in-memory analogue of `compile_files`. Takes
/// a map of virtual path → source text, runs the identical pipeline over a
/// `MockFileSystem` seeded with it, and returns generated text per file
/// instead of writing it anywhere.
pub fn compile_sources(
    sources: &HashMap<PathBuf, String>,
    config: &CompilerConfig,
) -> Result<HashMap<PathBuf, (String, String)>, CnxError> {
    let mut mock = crate::fs::MockFileSystem::new();
    for (path, text) in sources {
        mock = mock.with_file(path.clone(), text.clone());
    }
    let roots: Vec<PathBuf> = sources.keys().cloned().collect();
    let result = run(&mock, &roots, config)?;
    Ok(result
        .files
        .into_iter()
        .map(|f| (f.source_path, (f.source_text, f.header_text)))
        .collect())
}

/// Deletes every previously generated file under `out_dir` (and
/// `header_out_dir`, if distinct) — anything whose first non-blank line
/// carries the generator marker (§6 `clean` command).
pub fn clean(fs: &dyn FileSystem, out_dir: &Path, header_out_dir: Option<&Path>) -> io::Result<Vec<PathBuf>> {
    let mut dirs = vec![out_dir.to_path_buf()];
    if let Some(header_out_dir) = header_out_dir {
        if header_out_dir != out_dir {
            dirs.push(header_out_dir.to_path_buf());
        }
    }

    let mut removed = Vec::new();
    for dir in dirs {
        if !fs.is_directory(&dir) {
            continue;
        }
        removed.extend(clean_dir(fs, &dir)?);
    }
    Ok(removed)
}

fn clean_dir(fs: &dyn FileSystem, dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in fs.readdir(dir)? {
        if fs.is_directory(&entry) {
            removed.extend(clean_dir(fs, &entry)?);
            continue;
        }
        if let Ok(contents) = fs.read(&entry) {
            if header_parser::is_generated_header(&contents) {
                fs.remove(&entry)?;
                removed.push(entry);
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    fn config() -> CompilerConfig {
        CompilerConfig {
            out_dir: PathBuf::from("/out"),
            base_path: PathBuf::from("/proj"),
            ..CompilerConfig::default()
        }
    }

    #[test]
    fn compiles_single_file_and_mirrors_output_tree() {
        let fs = MockFileSystem::new().with_file("/proj/src/a.cnx", "u32 counter <- 0;\nvoid f() {}\n");
        let diagnostics = compile_files(&fs, &[PathBuf::from("/proj/src/a.cnx")], &config()).unwrap();
        assert!(!diagnostics.has_errors());
        let written = fs.written_files();
        assert!(written.iter().any(|(p, _)| p == Path::new("/out/src/a.c")));
        assert!(written.iter().any(|(p, _)| p == Path::new("/out/src/a.h")));
    }

    #[test]
    fn generated_source_includes_its_own_header() {
        let fs = MockFileSystem::new().with_file("/proj/a.cnx", "void f() {}\n");
        compile_files(&fs, &[PathBuf::from("/proj/a.cnx")], &config()).unwrap();
        let (_, text) = fs.written_files().into_iter().find(|(p, _)| p == Path::new("/out/a.c")).unwrap();
        assert!(text.contains("#include \"a.h\""));
    }

    #[test]
    fn header_out_dir_overrides_header_location() {
        let fs = MockFileSystem::new().with_file("/proj/a.cnx", "void f() {}\n");
        let config = CompilerConfig { header_out_dir: Some(PathBuf::from("/headers")), ..config() };
        compile_files(&fs, &[PathBuf::from("/proj/a.cnx")], &config).unwrap();
        let written = fs.written_files();
        assert!(written.iter().any(|(p, _)| p == Path::new("/headers/a.h")));
        assert!(!written.iter().any(|(p, _)| p == Path::new("/out/a.h")));
    }

    #[test]
    fn symbol_collection_error_skips_only_that_file() {
        let fs = MockFileSystem::new()
            .with_file("/proj/bad.cnx", "enum E { A = 1, B = 1 }\n")
            .with_file("/proj/good.cnx", "void f() {}\n");
        let diagnostics = compile_files(&fs, &[PathBuf::from("/proj/bad.cnx"), PathBuf::from("/proj/good.cnx")], &config()).unwrap();
        assert!(diagnostics.has_errors());
        let written = fs.written_files();
        assert!(written.iter().any(|(p, _)| p == Path::new("/out/good.c")));
        assert!(!written.iter().any(|(p, _)| p == Path::new("/out/bad.c")));
    }

    #[test]
    fn native_header_struct_becomes_opaque_forward_declaration() {
        let fs = MockFileSystem::new()
            .with_file("/proj/a.cnx", "#include \"vendor.h\"\nvoid f() {}\n")
            .with_file("/proj/vendor.h", "struct VendorHandle { int id; };\n");
        compile_files(&fs, &[PathBuf::from("/proj/a.cnx")], &config()).unwrap();
        let (_, header) = fs.written_files().into_iter().find(|(p, _)| p == Path::new("/out/a.h")).unwrap();
        assert!(header.contains("typedef struct VendorHandle VendorHandle;"));
    }

    #[test]
    fn compile_sources_runs_without_touching_disk() {
        let mut sources = HashMap::new();
        sources.insert(PathBuf::from("a.cnx"), "void f() {}\n".to_string());
        let outputs = compile_sources(&sources, &CompilerConfig::default()).unwrap();
        let (source_text, header_text) = &outputs[&PathBuf::from("a.cnx")];
        assert!(source_text.contains("void f(void)"));
        assert!(header_text.contains("void f(void);"));
    }

    #[test]
    fn clean_removes_only_generated_files() {
        let fs = MockFileSystem::new()
            .with_file("/out/a.h", format!("{}\n#endif\n", header_gen::GENERATED_MARKER))
            .with_file("/out/notes.txt", "hand-written, keep me\n");
        let removed = clean(&fs, Path::new("/out"), None).unwrap();
        assert_eq!(removed, vec![PathBuf::from("/out/a.h")]);
        assert!(fs.exists(Path::new("/out/notes.txt")));
        assert!(!fs.exists(Path::new("/out/a.h")));
    }
}
