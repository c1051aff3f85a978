//! C-Next Compiler Library
//!
//! Translates `.cnx`/`.cnext` source into C or C++: lexer/parser, include
//! resolver, native-header parser, symbol collector, code generator, and
//! header generator, wired together by `pipeline`.
//!
//! ```rust,ignore
//! use cnextc::config::CompilerConfig;
//! use cnextc::pipeline::compile_sources;
//! use std::collections::HashMap;
//! use std::path::PathBuf;
//!
//! let mut sources = HashMap::new();
//! sources.insert(PathBuf::from("a.cnx"), "void f() {}\n".to_string());
//! let outputs = compile_sources(&sources, &CompilerConfig::default())?;
//! # Ok::<(), cnextc::error::CnxError>(())
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fs;
pub mod header_gen;
pub mod header_parser;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod symbols;
pub mod types;

pub use ast::Program;
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, DiagnosticSink, ErrorCode};
pub use error::CnxError;
pub use pipeline::{compile_files, compile_sources};
