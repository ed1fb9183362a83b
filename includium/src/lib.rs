#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # C preprocessor library
//!
//! A complete, standalone C preprocessor: macro expansion (object-like
//! and function-like, including `#`/`##` and variadic `__VA_ARGS__`),
//! conditional compilation, `#include` via a caller-supplied resolver,
//! target/compiler builtin macros, and a small tagged-expression-tree
//! calculator usable independently of the line-oriented driver.
//!
//! ## Example
//!
//! ```rust,no_run
//! use includium::PreprocessorConfig;
//!
//! let code = r#"
//! #define PI 3.14
//! #ifdef __linux__
//! const char* platform = "Linux";
//! #endif
//! "#;
//!
//! let config = PreprocessorConfig::for_linux();
//! let result = includium::process(code, &config).unwrap();
//! ```

mod c_api;
mod calculator;
mod config;
mod context;
mod date_time;
mod driver;
mod engine;
mod error;
mod expansion;
mod expr;
mod include;
mod macro_def;
mod macro_table;
mod string_cache;
mod token;

pub use calculator::{Expression, Operator, parse_expression, run_expression};
pub use config::{Compiler, IncludeContext, IncludeKind, IncludeResolver, PreprocessorConfig, Target, WarningHandler};
pub use context::PreprocessorContext;
pub use driver::{PreprocessorDriver, TokenIterator};
pub use error::{PreprocessError, PreprocessErrorKind};
pub use macro_def::{MacroDefinition, ParamCount};
pub use token::{OwnedToken, Token, TokenKind};

/// Stateless lexing and text-shaping helpers (comment stripping, line
/// splicing, tokenizing), exposed standalone since they don't require a
/// full preprocessing session.
pub mod lexing {
    pub use crate::engine::PreprocessorEngine;
}

/// Kept as an alias for this library's historical name for [`MacroDefinition`].
pub use macro_def::Macro;
/// Kept as an alias for this library's historical name for [`PreprocessorDriver`].
pub use PreprocessorDriver as Preprocessor;

use std::fs;
use std::path::Path;

/// Preprocesses `input` under the given configuration, defining the
/// configuration's target/compiler macros first.
///
/// # Errors
/// Returns [`PreprocessError`] for a malformed directive, an exceeded
/// macro recursion limit, an unresolved `#include`, or an unterminated
/// conditional block.
pub fn process<S: AsRef<str>>(input: S, config: &PreprocessorConfig) -> Result<String, PreprocessError> {
    let mut driver = PreprocessorDriver::with_config(config);
    driver.process(input.as_ref())
}

/// Preprocesses a file on disk and writes the result to another file.
///
/// # Errors
/// Returns [`PreprocessError`] if either file cannot be accessed, or if
/// preprocessing itself fails.
pub fn process_file<P: AsRef<Path>>(input_path: P, output_path: P, config: &PreprocessorConfig) -> Result<(), PreprocessError> {
    let input = fs::read_to_string(input_path)?;
    let output = process(&input, config)?;
    fs::write(output_path, output)?;
    Ok(())
}

/// Preprocesses a file on disk and returns the result as a string.
///
/// # Errors
/// Returns [`PreprocessError`] if the file cannot be read or if
/// preprocessing fails.
pub fn preprocess_c_file_to_string<P: AsRef<Path>>(input_path: P, config: &PreprocessorConfig) -> Result<String, PreprocessError> {
    let input = fs::read_to_string(input_path)?;
    process(&input, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_object_macro() {
        let src = "\n#define PI 3.14\nfloat x = PI;\n";
        let mut pp = Preprocessor::new();
        let out = pp.process(src).unwrap();
        assert!(out.contains("3.14"));
    }

    #[test]
    fn process_honors_target_macros() {
        let out = process("#ifdef __linux__\nlinux\n#endif", &PreprocessorConfig::for_linux()).unwrap();
        assert!(out.contains("linux"));
    }

    #[test]
    fn windows_config_defines_win32() {
        let out = process("#ifdef _WIN32\nwindows\n#endif", &PreprocessorConfig::for_windows()).unwrap();
        assert!(out.contains("windows"));
    }

    #[test]
    fn process_file_round_trips_through_disk() {
        let dir = std::env::temp_dir();
        let input_path = dir.join("includium_lib_test_input.c");
        let output_path = dir.join("includium_lib_test_output.c");
        fs::write(&input_path, "#define X 1\nX\n").unwrap();
        process_file(&input_path, &output_path, &PreprocessorConfig::for_linux()).unwrap();
        let out = fs::read_to_string(&output_path).unwrap();
        assert!(out.trim_end().ends_with('1'));
        let _ = fs::remove_file(&input_path);
        let _ = fs::remove_file(&output_path);
    }
}
