//! Public API driver: ties the context, engine, expansion, and
//! expression evaluator together into a line-oriented `process()` pass
//! over a whole translation unit, plus the directive handlers that
//! drive conditional compilation and `#include`.

use std::rc::Rc;

use crate::config::{IncludeContext, IncludeKind, PreprocessorConfig};
use crate::context::PreprocessorContext;
use crate::engine::PreprocessorEngine;
use crate::error::PreprocessError;
use crate::expansion::expand_text;
use crate::expr;
use crate::include::{Conditional, ConditionalKind};
use crate::macro_def::{MacroDefinition, PARAMCOUNT_FUNCTIONLIKE_VOID, PARAMCOUNT_OBJECTLIKE, ParamCount};
use crate::token::{OwnedToken, TokenKind};

/// An iterator over the tokens of a preprocessed translation unit, as
/// returned by [`PreprocessorDriver::tokens`]. Unlike [`Self::process`],
/// this surface hands back the macro-expanded token stream itself rather
/// than the brace/indent-flattened text rendering of it.
pub struct TokenIterator {
    inner: std::vec::IntoIter<OwnedToken>,
}

impl Iterator for TokenIterator {
    type Item = OwnedToken;

    fn next(&mut self) -> Option<OwnedToken> {
        self.inner.next()
    }
}

/// Public, stateful entry point for preprocessing a translation unit.
pub struct PreprocessorDriver {
    context: PreprocessorContext,
}

impl Default for PreprocessorDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorDriver {
    #[must_use]
    pub fn new() -> Self {
        PreprocessorDriver { context: PreprocessorContext::new() }
    }

    #[must_use]
    pub fn with_config(config: &PreprocessorConfig) -> Self {
        let mut driver = Self::new();
        driver.apply_config(config);
        driver
    }

    pub fn apply_config(&mut self, config: &PreprocessorConfig) {
        self.context.apply_config(config);
    }

    #[must_use]
    pub fn with_include_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, IncludeKind, &IncludeContext) -> Option<String> + 'static,
    {
        self.context.include_resolver = Some(Rc::new(f));
        self
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.context.recursion_limit = limit;
    }

    /// Defines a macro as if by `#define`, outside of any source text.
    ///
    /// # Errors
    /// Fails if `name` is already defined.
    pub fn define(
        &mut self,
        name: &str,
        params: Option<Vec<&str>>,
        body: &str,
        is_variadic: bool,
    ) -> Result<(), PreprocessError> {
        let (parameters, paramcount) = match params {
            None => (Vec::new(), PARAMCOUNT_OBJECTLIKE),
            Some(p) if p.is_empty() => (Vec::new(), PARAMCOUNT_FUNCTIONLIKE_VOID),
            Some(p) => {
                let count = p.len() as ParamCount;
                (p.into_iter().map(Rc::from).collect(), count)
            }
        };
        self.context.define(Rc::from(name), parameters, paramcount, is_variadic, &normalize_whitespace(body))
    }

    pub fn undef(&mut self, name: &str) {
        self.context.undef(name);
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.context.is_defined(name)
    }

    #[must_use]
    pub fn get_macro(&self, name: &str) -> Option<MacroDefinition> {
        self.context.lookup(name)
    }

    /// Preprocesses `input` as the named top-level translation unit.
    ///
    /// # Errors
    /// Returns a [`PreprocessError`] for any malformed directive,
    /// unterminated conditional, unresolved `#include`, macro arity
    /// mismatch, or recursion-limit violation.
    pub fn process(&mut self, input: &str) -> Result<String, PreprocessError> {
        self.process_named("<stdin>", input)
    }

    /// Preprocesses `input`, reporting diagnostics under `filename` and
    /// making it the value `__FILE__` resolves to at the top level.
    ///
    /// # Errors
    /// See [`Self::process`].
    pub fn process_named(&mut self, filename: &str, input: &str) -> Result<String, PreprocessError> {
        let filename = self.context.strings.intern(filename);
        self.context.include_stack.push(Rc::clone(&filename), Rc::from(""), 1, None);
        let result = self.process_frame(input);
        let leftover = self.context.include_stack.pop();
        if let Some(cond) = leftover.first() {
            return Err(PreprocessError::conditional_error(cond.kind.unterminated_message())
                .with_file(filename.as_ref())
                .with_line(cond.opened_line));
        }
        result.map(|canonical| flatten_tokens(&canonical))
    }

    /// Preprocesses `input` and returns its expanded token stream
    /// directly, without the brace/indent flattening pass [`Self::process`]
    /// applies on top of it.
    ///
    /// # Errors
    /// See [`Self::process`].
    pub fn tokens(&mut self, input: &str) -> Result<TokenIterator, PreprocessError> {
        self.tokens_named("<stdin>", input)
    }

    /// Like [`Self::tokens`], reporting diagnostics under `filename`.
    ///
    /// # Errors
    /// See [`Self::process`].
    pub fn tokens_named(&mut self, filename: &str, input: &str) -> Result<TokenIterator, PreprocessError> {
        let filename = self.context.strings.intern(filename);
        self.context.include_stack.push(Rc::clone(&filename), Rc::from(""), 1, None);
        let result = self.process_frame(input);
        let leftover = self.context.include_stack.pop();
        if let Some(cond) = leftover.first() {
            return Err(PreprocessError::conditional_error(cond.kind.unterminated_message())
                .with_file(filename.as_ref())
                .with_line(cond.opened_line));
        }
        let canonical = result?;
        let owned: Vec<OwnedToken> = PreprocessorEngine::tokenize_line(&canonical)
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Whitespace))
            .map(|t| {
                let text = t.text(&canonical).to_string();
                OwnedToken { kind: t.kind, text }
            })
            .collect();
        Ok(TokenIterator { inner: owned.into_iter() })
    }

    fn process_frame(&mut self, input: &str) -> Result<String, PreprocessError> {
        let spliced = PreprocessorEngine::line_splice(input);
        let stripped = PreprocessorEngine::strip_comments(&spliced);
        let pragma_processed = PreprocessorEngine::process_pragma(&stripped);

        let mut out_lines: Vec<String> = Vec::new();
        let mut line_no = 1usize;

        for raw_line in pragma_processed.lines() {
            if let Some(frame) = self.context.include_stack.top_mut() {
                frame.line = line_no;
            }

            if let Some(directive) = extract_directive(raw_line) {
                if let Some(content) = self.handle_directive(directive, raw_line, line_no)? {
                    out_lines.push(content);
                }
            } else if self.can_emit_line() {
                let expanded = expand_text(&mut self.context, raw_line, 0)?;
                out_lines.push(expanded);
            }
            line_no += 1;
        }

        Ok(out_lines.join("\n"))
    }

    fn can_emit_line(&self) -> bool {
        !self.context.include_stack.is_skipping()
    }

    fn error_at(&self, message: impl Into<String>, line: &str, line_no: usize) -> PreprocessError {
        let file = self.context.include_stack.top().map(|f| f.filename.to_string()).unwrap_or_default();
        PreprocessError::malformed_directive(message).with_file(file).with_line(line_no).with_source_line(line)
    }

    fn handle_directive(
        &mut self,
        directive: &str,
        full_line: &str,
        line_no: usize,
    ) -> Result<Option<String>, PreprocessError> {
        let mut parts = directive.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("").trim();
        let rest = parts.next().unwrap_or("").trim();

        match cmd {
            "define" => self.handle_define(rest, full_line, line_no).map(|()| None),
            "undef" => self.handle_undef(rest, full_line, line_no).map(|()| None),
            "include" => self.handle_include(rest, full_line, line_no),
            "ifdef" => {
                self.push_conditional(ConditionalKind::Ifdef, self.is_defined(rest.trim()), line_no);
                Ok(None)
            }
            "ifndef" => {
                self.push_conditional(ConditionalKind::Ifndef, !self.is_defined(rest.trim()), line_no);
                Ok(None)
            }
            "if" => {
                let taken = self.evaluate_condition(rest, full_line, line_no)?;
                self.push_conditional(ConditionalKind::If, taken, line_no);
                Ok(None)
            }
            "elif" => self.handle_elif(rest, full_line, line_no).map(|()| None),
            "else" => self.handle_else(full_line, line_no).map(|()| None),
            "endif" => self.handle_endif(full_line, line_no).map(|()| None),
            "error" => self.handle_error(rest, full_line, line_no).map(|()| None),
            "warning" => {
                self.handle_warning(rest);
                Ok(None)
            }
            "line" => self.handle_line(rest).map(|()| None),
            "pragma" => self.handle_pragma(rest).map(|()| None),
            _ => Ok(None),
        }
    }

    fn push_conditional(&mut self, kind: ConditionalKind, taken: bool, line_no: usize) {
        let parent_skipping = self.context.include_stack.is_skipping();
        if let Some(frame) = self.context.include_stack.top_mut() {
            frame.conditionals.push(Conditional::new(kind, line_no, taken, parent_skipping));
        }
    }

    fn handle_define(&mut self, rest: &str, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        if !self.can_emit_line() {
            return Ok(());
        }
        let rest = rest.trim_start();
        if rest.is_empty() {
            return Err(self.error_at("#define requires a macro name", full_line, line_no));
        }

        let mut chars = rest.chars().peekable();
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error_at("#define requires a macro name", full_line, line_no));
        }

        let mut parameters: Vec<Rc<str>> = Vec::new();
        let mut paramcount = PARAMCOUNT_OBJECTLIKE;
        let mut is_variadic = false;

        if chars.peek() == Some(&'(') {
            chars.next();
            let mut param = String::new();
            loop {
                match chars.peek() {
                    None => return Err(self.error_at("unterminated macro parameter list", full_line, line_no)),
                    Some(&')') => {
                        if !param.trim().is_empty() {
                            parameters.push(Rc::from(param.trim()));
                        }
                        chars.next();
                        break;
                    }
                    Some(&',') => {
                        parameters.push(Rc::from(param.trim()));
                        param.clear();
                        chars.next();
                    }
                    Some(&'.') => {
                        is_variadic = true;
                        chars.next();
                        while chars.peek() == Some(&'.') {
                            chars.next();
                        }
                    }
                    Some(&c) => {
                        param.push(c);
                        chars.next();
                    }
                }
            }
            paramcount = if parameters.is_empty() { PARAMCOUNT_FUNCTIONLIKE_VOID } else { parameters.len() as ParamCount };
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let body: String = chars.collect();
        let body = normalize_whitespace(&body);

        self.context.define(Rc::from(name.as_str()), parameters, paramcount, is_variadic, &body)
    }

    fn handle_undef(&mut self, rest: &str, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        if !self.can_emit_line() {
            return Ok(());
        }
        let name = rest.split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return Err(self.error_at("#undef requires a macro name", full_line, line_no));
        }
        self.context.undef(name);
        Ok(())
    }

    fn handle_include(
        &mut self,
        rest: &str,
        full_line: &str,
        line_no: usize,
    ) -> Result<Option<String>, PreprocessError> {
        if !self.can_emit_line() {
            return Ok(None);
        }

        let trimmed = rest.trim();
        let (path, kind) = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            (trimmed[1..trimmed.len() - 1].to_string(), IncludeKind::Local)
        } else if trimmed.len() >= 2 && trimmed.starts_with('<') && trimmed.ends_with('>') {
            (trimmed[1..trimmed.len() - 1].to_string(), IncludeKind::System)
        } else {
            return Err(self.error_at("malformed #include", full_line, line_no));
        };

        let Some(resolver) = self.context.include_resolver.clone() else {
            return Err(PreprocessError::include_not_found(&path)
                .with_file(self.context.include_stack.top().map(|f| f.filename.to_string()).unwrap_or_default())
                .with_line(line_no));
        };

        let real_filenames = self.context.include_stack.real_filenames();
        if real_filenames.iter().any(|f| f.as_ref() == path) {
            return Err(self.error_at(format!("include cycle detected for '{path}'"), full_line, line_no));
        }

        if self.context.included_once.contains(path.as_str()) {
            return Ok(Some(String::new()));
        }

        let ctx = IncludeContext { include_stack: real_filenames.iter().map(|f| f.to_string()).collect(), include_dirs: Vec::new() };
        let Some(content) = resolver(&path, kind, &ctx) else {
            return Err(PreprocessError::include_not_found(&path)
                .with_file(self.context.include_stack.top().map(|f| f.filename.to_string()).unwrap_or_default())
                .with_line(line_no));
        };

        let interned: Rc<str> = self.context.strings.intern(&path);
        self.context.include_stack.push(Rc::clone(&interned), Rc::from(""), 1, None);
        let processed = self.process_frame(&content);
        let leftover = self.context.include_stack.pop();
        let processed = processed?;
        if let Some(cond) = leftover.first() {
            return Err(PreprocessError::conditional_error(cond.kind.unterminated_message())
                .with_file(interned.as_ref())
                .with_line(cond.opened_line));
        }

        Ok(Some(processed))
    }

    fn handle_elif(&mut self, rest: &str, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        let frame = self.context.include_stack.top().ok_or_else(|| self.error_at("#elif without #if", full_line, line_no))?;
        if frame.conditionals.is_empty() {
            return Err(self.error_at("#elif without #if", full_line, line_no));
        }
        let depth = frame.conditionals.len();
        let parent_skipping = if depth < 2 { false } else { frame.conditionals[depth - 2].skipping };
        let already_chosen = frame.conditionals[depth - 1].chosen;

        let taken = !already_chosen && self.evaluate_condition(rest, full_line, line_no)?;
        if let Some(frame) = self.context.include_stack.top_mut() {
            if let Some(last) = frame.conditionals.last_mut() {
                last.kind = ConditionalKind::Elif;
                last.chosen = last.chosen || taken;
                last.skipping = parent_skipping || !taken;
            }
        }
        Ok(())
    }

    fn handle_else(&mut self, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        let frame = self.context.include_stack.top().ok_or_else(|| self.error_at("#else without #if", full_line, line_no))?;
        if frame.conditionals.is_empty() {
            return Err(self.error_at("#else without #if", full_line, line_no));
        }
        let depth = frame.conditionals.len();
        let parent_skipping = if depth < 2 { false } else { frame.conditionals[depth - 2].skipping };

        let frame = self.context.include_stack.top_mut().ok_or_else(|| self.error_at("#else without #if", full_line, line_no))?;
        let Some(last) = frame.conditionals.last_mut() else {
            return Err(self.error_at("#else without #if", full_line, line_no));
        };
        let taken = !last.chosen;
        last.kind = ConditionalKind::Else;
        last.chosen = true;
        last.skipping = parent_skipping || !taken;
        Ok(())
    }

    fn handle_endif(&mut self, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        let frame = self.context.include_stack.top_mut().ok_or_else(|| self.error_at("#endif without #if", full_line, line_no))?;
        if frame.conditionals.pop().is_none() {
            return Err(self.error_at("#endif without #if", full_line, line_no));
        }
        Ok(())
    }

    fn handle_error(&mut self, rest: &str, full_line: &str, line_no: usize) -> Result<(), PreprocessError> {
        if !self.can_emit_line() {
            return Ok(());
        }
        let msg = if rest.is_empty() { "#error directive".to_string() } else { format!("#error: {rest}") };
        Err(self.error_at(msg, full_line, line_no))
    }

    fn handle_warning(&mut self, rest: &str) {
        if !self.can_emit_line() {
            return;
        }
        let msg = if rest.is_empty() { "#warning directive".to_string() } else { format!("#warning: {rest}") };
        if let Some(handler) = &self.context.warning_handler {
            handler(&msg);
        } else {
            log::warn!(target: "includium::driver", "{msg}");
        }
    }

    fn handle_line(&mut self, rest: &str) -> Result<(), PreprocessError> {
        if !self.can_emit_line() {
            return Ok(());
        }
        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some(first) = parts.first() else { return Ok(()) };
        let Ok(line_num) = first.parse::<usize>() else { return Ok(()) };
        if let Some(frame) = self.context.include_stack.top_mut() {
            frame.line = line_num.saturating_sub(1);
        }
        if let Some(raw_name) = parts.get(1) {
            let name = raw_name.trim_matches('"');
            let interned = self.context.strings.intern(name);
            if let Some(frame) = self.context.include_stack.top_mut() {
                frame.filename = interned;
            }
        }
        Ok(())
    }

    fn handle_pragma(&mut self, rest: &str) -> Result<(), PreprocessError> {
        if !self.can_emit_line() {
            return Ok(());
        }
        if rest.trim() == "once" {
            if let Some(frame) = self.context.include_stack.top() {
                self.context.included_once.insert(Rc::clone(&frame.filename));
            }
        }
        Ok(())
    }

    fn evaluate_condition(&mut self, rest: &str, full_line: &str, line_no: usize) -> Result<bool, PreprocessError> {
        let file = self.context.include_stack.top().map(|f| f.filename.to_string()).unwrap_or_default();
        expr::evaluate(rest, &self.context.macros)
            .map(|v| v != 0)
            .map_err(|e| e.with_file(file).with_line(line_no).with_source_line(full_line))
    }
}

fn extract_directive(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix('#').map(str::trim)
}

/// Re-derives the final output layout from the uniformly single-spaced
/// canonical text the expansion pass produces: a newline plus indent is
/// inserted before `{` (and indent increases); `;` and `}` are each
/// followed by a newline (indent decreases before `}`); any other pair of
/// adjacent tokens on the same output line gets a single space between
/// them. Newlines already present in the canonical text are carried
/// through as-is.
fn flatten_tokens(canonical: &str) -> String {
    let tokens = PreprocessorEngine::tokenize_line(canonical);
    let mut out = String::with_capacity(canonical.len());
    let mut indent = 0usize;

    fn at_line_start(s: &str) -> bool {
        s.is_empty() || s.ends_with('\n')
    }

    for tok in &tokens {
        match tok.kind {
            TokenKind::Whitespace => {}
            TokenKind::Newline => out.push('\n'),
            TokenKind::Punctuation('{') => {
                if !at_line_start(&out) {
                    out.push('\n');
                }
                out.push_str(&"    ".repeat(indent));
                out.push('{');
                indent += 1;
                out.push('\n');
            }
            TokenKind::Punctuation('}') => {
                indent = indent.saturating_sub(1);
                if !at_line_start(&out) {
                    out.push('\n');
                }
                out.push_str(&"    ".repeat(indent));
                out.push('}');
                out.push('\n');
            }
            TokenKind::Punctuation(';') => {
                if at_line_start(&out) {
                    out.push_str(&"    ".repeat(indent));
                }
                out.push(';');
                out.push('\n');
            }
            _ => {
                if at_line_start(&out) {
                    out.push_str(&"    ".repeat(indent));
                } else {
                    out.push(' ');
                }
                out.push_str(tok.text(canonical));
            }
        }
    }

    out
}

/// Collapses runs of whitespace to a single space and trims the ends,
/// matching [`MacroDefinition`]'s documented body normalization.
fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_like_define_and_use() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process("#define ANSWER 42\nint x = ANSWER;").unwrap();
        assert_eq!(out, "int x = 42;\n");
    }

    #[test]
    fn function_like_macro() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process("#define SQ(x) ((x) * (x))\nSQ(5)").unwrap();
        assert_eq!(out, "( ( 5 ) * ( 5 ) )");
    }

    #[test]
    fn flatten_breaks_braces_onto_their_own_indented_lines() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process("#define BODY x = 1;\nif (x) { BODY }").unwrap();
        assert_eq!(out, "if ( x )\n{\n    x = 1;\n}\n");
    }

    #[test]
    fn tokens_yields_the_expanded_stream_without_flattening() {
        let mut driver = PreprocessorDriver::new();
        let kinds: Vec<TokenKind> = driver.tokens("#define ANSWER 42\nint x = ANSWER;").unwrap().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Punctuation('='),
                TokenKind::IntLiteral,
                TokenKind::Punctuation(';'),
            ]
        );
    }

    #[test]
    fn conditional_compilation_selects_taken_branch() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process("#if 1\nyes\n#else\nno\n#endif").unwrap();
        assert!(out.contains("yes"));
        assert!(!out.contains("no"));
    }

    #[test]
    fn ifdef_and_elif_chain() {
        let mut driver = PreprocessorDriver::new();
        let out = driver
            .process("#define B\n#ifdef A\n1\n#elif defined(B)\n2\n#else\n3\n#endif")
            .unwrap();
        assert!(out.trim_end().ends_with('2'));
    }

    #[test]
    fn unterminated_conditional_is_an_error() {
        let mut driver = PreprocessorDriver::new();
        let err = driver.process("#if 1\nx").unwrap_err();
        assert!(err.message().contains("Unterminated"));
    }

    #[test]
    fn undef_then_redefine_is_allowed() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process("#define A 1\n#undef A\n#define A 2\nA").unwrap();
        assert!(out.trim_end().ends_with('2'));
    }

    #[test]
    fn include_resolver_is_consulted() {
        let mut driver = PreprocessorDriver::new().with_include_resolver(|path, _, _| {
            if path == "inner.h" { Some("#define X 9\n".to_string()) } else { None }
        });
        let out = driver.process("#include \"inner.h\"\nX").unwrap();
        assert!(out.trim_end().ends_with('9'));
    }

    #[test]
    fn builtin_file_and_line_macros() {
        let mut driver = PreprocessorDriver::new();
        let out = driver.process_named("main.c", "__LINE__\n__FILE__").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "\"main.c\"");
    }

    #[test]
    fn error_directive_stops_processing() {
        let mut driver = PreprocessorDriver::new();
        let err = driver.process("#error boom").unwrap_err();
        assert!(err.message().contains("boom"));
    }
}
