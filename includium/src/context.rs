//! All mutable preprocessor state: the macro table, the include stack,
//! the recursion guard, and the builtin macros a [`PreprocessorConfig`]
//! materializes.

use std::collections::HashSet;
use std::rc::Rc;

use crate::config::{Compiler, IncludeResolver, PreprocessorConfig, Target, WarningHandler};
use crate::date_time::{format_date, format_time};
use crate::error::PreprocessError;
use crate::include::IncludeStack;
use crate::macro_def::{MacroDefinition, ParamCount, PARAMCOUNT_OBJECTLIKE};
use crate::macro_table::MacroTable;
use crate::string_cache::StringCache;

/// Names that start life as live, recomputed-on-lookup builtins. A user
/// `#define`/`#undef` of either name releases it permanently: afterward
/// it behaves like any other table entry, including staying undefined
/// if the user `#undef`s it without redefining.
fn is_special_name(name: &str) -> bool {
    name == "__FILE__" || name == "__LINE__"
}

pub struct PreprocessorContext {
    pub macros: MacroTable,
    /// Names currently being expanded; consulted by the expansion
    /// engine's recursion guard before it re-enters a macro body.
    pub disabled_macros: HashSet<Rc<str>>,
    /// Files already pulled in under `#pragma once`.
    pub included_once: HashSet<Rc<str>>,
    pub strings: StringCache,
    pub include_stack: IncludeStack,
    pub include_resolver: Option<IncludeResolver>,
    pub recursion_limit: usize,
    pub compiler: Compiler,
    pub warning_handler: Option<WarningHandler>,
    /// `__FILE__`/`__LINE__` names the user has `#define`d or `#undef`ed
    /// at least once, and which therefore no longer synthesize.
    released_specials: HashSet<&'static str>,
}

impl Default for PreprocessorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorContext {
    #[must_use]
    pub fn new() -> Self {
        PreprocessorContext {
            macros: MacroTable::new(),
            disabled_macros: HashSet::new(),
            included_once: HashSet::new(),
            strings: StringCache::new(),
            include_stack: IncludeStack::new(),
            include_resolver: None,
            recursion_limit: 256,
            compiler: Compiler::GCC,
            warning_handler: None,
            released_specials: HashSet::new(),
        }
    }

    pub fn apply_config(&mut self, config: &PreprocessorConfig) {
        self.compiler = config.compiler.clone();
        self.recursion_limit = config.recursion_limit;
        self.include_resolver.clone_from(&config.include_resolver);
        self.warning_handler.clone_from(&config.warning_handler);

        self.define_target_macros(&config.target);
        self.define_compiler_macros(&config.compiler);

        self.stub_compiler_intrinsics();
        self.define_sizeof_stubs();

        // __DATE__/__TIME__ are stamped once at config time rather than
        // recomputed on lookup like __FILE__/__LINE__: the standard only
        // requires them to reflect translation time, not to change
        // mid-session.
        self.define_builtin("__DATE__", &format!("\"{}\"", format_date()));
        self.define_builtin("__TIME__", &format!("\"{}\"", format_time()));
    }

    fn define_target_macros(&mut self, target: &Target) {
        match target {
            Target::Linux => {
                self.define_builtin("__linux__", "1");
                self.define_builtin("__unix__", "1");
                self.define_builtin("__LP64__", "1");
            }
            Target::Windows => {
                self.define_builtin("_WIN32", "1");
                self.define_builtin("WIN32", "1");
                self.define_builtin("_WINDOWS", "1");
            }
            Target::MacOS => {
                self.define_builtin("__APPLE__", "1");
                self.define_builtin("__MACH__", "1");
                self.define_builtin("TARGET_OS_MAC", "1");
                self.define_builtin("__LP64__", "1");
            }
        }
    }

    fn define_compiler_macros(&mut self, compiler: &Compiler) {
        match compiler {
            Compiler::GCC => {
                self.define_builtin("__GNUC__", "11");
                self.define_builtin("__GNUC_MINOR__", "2");
                self.define_builtin("__GNUC_PATCHLEVEL__", "0");
                self.define_builtin("_GNU_SOURCE", "1");
            }
            Compiler::Clang => {
                self.define_builtin("__clang__", "1");
                self.define_builtin("__clang_major__", "14");
                self.define_builtin("__clang_minor__", "0");
                self.define_builtin("__clang_patchlevel__", "0");
            }
            Compiler::MSVC => {
                self.define_builtin("_MSC_VER", "1920");
                self.define_builtin("_MSC_FULL_VER", "192027508");
                self.define_builtin("WIN32_LEAN_AND_MEAN", "");
                self.define_builtin("_CRT_SECURE_NO_WARNINGS", "");
            }
        }
    }

    fn stub_compiler_intrinsics(&mut self) {
        self.define_builtin("__builtin_expect", "");
        self.define_builtin("__builtin_unreachable", "");
        self.define_builtin("__builtin_va_start", "");
        self.define_builtin("__builtin_va_arg", "");
        self.define_builtin("__builtin_va_end", "");
    }

    fn define_sizeof_stubs(&mut self) {
        self.define_builtin("__SIZEOF_INT__", "4");
        self.define_builtin("__SIZEOF_LONG__", "8");
        self.define_builtin("__SIZEOF_LONG_LONG__", "8");
        self.define_builtin("__SIZEOF_POINTER__", "8");
        self.define_builtin("__SIZEOF_SIZE_T__", "8");
        self.define_builtin("__SIZEOF_PTRDIFF_T__", "8");
    }

    /// Unconditionally installs an object-like builtin macro, overwriting
    /// any prior entry under the same name. Used only for config-derived
    /// target/compiler/intrinsic macros, never for user `#define`s.
    fn define_builtin(&mut self, name: &str, body: &str) {
        let name: Rc<str> = self.strings.intern(name);
        let body: Rc<str> = Rc::from(body);
        self.macros.force_insert(MacroDefinition {
            name,
            parameters: Vec::new(),
            paramcount: PARAMCOUNT_OBJECTLIKE,
            is_variadic: false,
            definition: Rc::clone(&body),
            original: body,
            definition_location: None,
            is_builtin: true,
        });
    }

    /// Installs a user-facing macro definition (`#define`). Fails if a
    /// non-identical definition already exists under this name.
    pub fn define(
        &mut self,
        name: Rc<str>,
        parameters: Vec<Rc<str>>,
        paramcount: ParamCount,
        is_variadic: bool,
        body: &str,
    ) -> Result<(), PreprocessError> {
        if is_special_name(&name) {
            self.released_specials.insert(if name.as_ref() == "__FILE__" { "__FILE__" } else { "__LINE__" });
        }
        let trimmed = body.trim();
        if trimmed.starts_with("##") || trimmed.ends_with("##") {
            return Err(PreprocessError::paste_at_boundary());
        }
        let body: Rc<str> = Rc::from(body);
        let location = self.include_stack.innermost_real_filename().zip(self.include_stack.innermost_real_line());
        self.macros.add(MacroDefinition {
            name,
            parameters,
            paramcount,
            is_variadic,
            definition: Rc::clone(&body),
            original: body,
            definition_location: location,
            is_builtin: false,
        })
    }

    /// Removes a macro definition (`#undef`); a miss is silently ignored,
    /// matching the original preprocessor's behavior.
    pub fn undef(&mut self, name: &str) {
        if is_special_name(name) {
            self.released_specials.insert(if name == "__FILE__" { "__FILE__" } else { "__LINE__" });
        }
        self.macros.remove(name);
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        if !self.released_specials.contains(name) && is_special_name(name) {
            return true;
        }
        self.macros.contains(name)
    }

    /// Looks up a macro definition by name, synthesizing `__FILE__`/`__LINE__`
    /// on the fly unless the user has released them via a prior
    /// `#define`/`#undef`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<MacroDefinition> {
        if !self.released_specials.contains(name) {
            if name == "__FILE__" {
                let file = self.include_stack.innermost_real_filename().unwrap_or_else(|| Rc::from("<stdin>"));
                let body: Rc<str> = Rc::from(format!("\"{file}\""));
                return Some(MacroDefinition {
                    name: Rc::from("__FILE__"),
                    parameters: Vec::new(),
                    paramcount: PARAMCOUNT_OBJECTLIKE,
                    is_variadic: false,
                    definition: Rc::clone(&body),
                    original: body,
                    definition_location: None,
                    is_builtin: true,
                });
            }
            if name == "__LINE__" {
                let line = self.include_stack.innermost_real_line().unwrap_or(0);
                let body: Rc<str> = Rc::from(line.to_string());
                return Some(MacroDefinition {
                    name: Rc::from("__LINE__"),
                    parameters: Vec::new(),
                    paramcount: PARAMCOUNT_OBJECTLIKE,
                    is_variadic: false,
                    definition: Rc::clone(&body),
                    original: body,
                    definition_location: None,
                    is_builtin: true,
                });
            }
        }
        self.macros.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_line_synthesize_without_being_stored() {
        let mut ctx = PreprocessorContext::new();
        ctx.include_stack.push(Rc::from("main.c"), Rc::from(""), 7, None);
        assert!(!ctx.macros.contains("__FILE__"));
        let file = ctx.lookup("__FILE__").unwrap();
        assert_eq!(file.definition.as_ref(), "\"main.c\"");
        let line = ctx.lookup("__LINE__").unwrap();
        assert_eq!(line.definition.as_ref(), "7");
    }

    #[test]
    fn user_define_releases_the_builtin() {
        let mut ctx = PreprocessorContext::new();
        ctx.include_stack.push(Rc::from("main.c"), Rc::from(""), 1, None);
        ctx.define(Rc::from("__LINE__"), Vec::new(), PARAMCOUNT_OBJECTLIKE, false, "42").unwrap();
        let line = ctx.lookup("__LINE__").unwrap();
        assert_eq!(line.definition.as_ref(), "42");
    }

    #[test]
    fn undef_then_redefine_is_idempotent() {
        let mut ctx = PreprocessorContext::new();
        ctx.define(Rc::from("A"), Vec::new(), PARAMCOUNT_OBJECTLIKE, false, "X").unwrap();
        ctx.undef("A");
        ctx.define(Rc::from("A"), Vec::new(), PARAMCOUNT_OBJECTLIKE, false, "X").unwrap();
        assert_eq!(ctx.lookup("A").unwrap().definition.as_ref(), "X");
    }

    #[test]
    fn body_ending_in_paste_is_rejected() {
        let mut ctx = PreprocessorContext::new();
        let err = ctx.define(Rc::from("BAD"), vec![Rc::from("a")], 1, false, "a##").unwrap_err();
        assert_eq!(err.message(), "'##' cannot appear at either end of a macro expansion");
    }

    #[test]
    fn body_starting_with_paste_is_rejected() {
        let mut ctx = PreprocessorContext::new();
        let err = ctx.define(Rc::from("BAD"), vec![Rc::from("a")], 1, false, "## a").unwrap_err();
        assert_eq!(err.message(), "'##' cannot appear at either end of a macro expansion");
    }

    #[test]
    fn apply_config_defines_target_and_compiler_macros() {
        let mut ctx = PreprocessorContext::new();
        ctx.apply_config(&PreprocessorConfig::for_linux());
        assert!(ctx.is_defined("__linux__"));
        assert!(ctx.is_defined("__GNUC__"));
        assert!(ctx.is_defined("__SIZEOF_POINTER__"));
    }
}
