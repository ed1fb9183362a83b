//! A single macro definition, and the lightweight variant used to bind
//! a function-like macro's parameters to their call-site arguments
//! during substitution.

use std::rc::Rc;

/// Sentinel sharing one field for "function-like with N params",
/// "function-like with zero params" and "object-like".
///
/// - `-1`: function-like, declared with `()`, accepts zero arguments.
/// - `0`: object-like, no parameter list at all.
/// - `n > 0`: function-like with `n` named parameters.
pub type ParamCount = i32;

pub const PARAMCOUNT_FUNCTIONLIKE_VOID: ParamCount = -1;
pub const PARAMCOUNT_OBJECTLIKE: ParamCount = 0;

#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: Rc<str>,
    pub parameters: Vec<Rc<str>>,
    pub paramcount: ParamCount,
    pub is_variadic: bool,
    /// The replacement body, whitespace-normalized to single spaces.
    pub definition: Rc<str>,
    /// Used only by the `#` stringify path: for a real macro this
    /// equals `definition`; for an argument binding it holds the
    /// argument's unexpanded text.
    pub original: Rc<str>,
    pub definition_location: Option<(Rc<str>, usize)>,
    pub is_builtin: bool,
}

impl MacroDefinition {
    #[must_use]
    pub fn is_function_like(&self) -> bool {
        self.paramcount != PARAMCOUNT_OBJECTLIKE
    }

    #[must_use]
    pub fn is_object_like(&self) -> bool {
        self.paramcount == PARAMCOUNT_OBJECTLIKE
    }

    /// Number of arguments a call site must supply (ignoring the
    /// "void call" zero-arg special case, which the caller resolves
    /// before this is checked).
    #[must_use]
    pub fn required_arg_count(&self) -> usize {
        match self.paramcount {
            PARAMCOUNT_FUNCTIONLIKE_VOID => 0,
            n => n.max(0) as usize,
        }
    }

    /// Builds a lightweight argument-to-text binding, standing in for
    /// the spec's `ArgBinding`: a parameterless, object-like "macro"
    /// whose `definition`/`original` hold the expanded/unexpanded
    /// argument text.
    #[must_use]
    pub fn arg_binding(name: Rc<str>, expanded: Rc<str>, original: Rc<str>) -> Self {
        Self {
            name,
            parameters: Vec::new(),
            paramcount: PARAMCOUNT_OBJECTLIKE,
            is_variadic: false,
            definition: expanded,
            original,
            definition_location: None,
            is_builtin: false,
        }
    }
}

/// Kept as an alias for the name this type was known under in an
/// earlier pass of this crate.
pub type Macro = MacroDefinition;
