//! The include stack: a LIFO stack of source frames, each owning its
//! own lexer cursor, line counter, and conditional-compilation stack.
//!
//! A frame is pushed either from a real `#include` (the caller's open
//! callback supplies the bytes) or from a synthetic source produced by
//! the preprocessor itself (predefined defines, a macro expansion).

use std::rc::Rc;

/// Which directive opened a [`Conditional`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalKind {
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
}

impl ConditionalKind {
    #[must_use]
    pub const fn unterminated_message(self) -> &'static str {
        match self {
            ConditionalKind::If => "Unterminated #if",
            ConditionalKind::Ifdef => "Unterminated #ifdef",
            ConditionalKind::Ifndef => "Unterminated #ifndef",
            ConditionalKind::Elif => "Unterminated #elif",
            ConditionalKind::Else => "Unterminated #else",
        }
    }
}

/// One level of `#if`/`#ifdef`/.../`#endif` nesting.
#[derive(Debug, Clone)]
pub struct Conditional {
    pub kind: ConditionalKind,
    pub opened_line: usize,
    /// Has any branch of this chain been taken yet.
    pub chosen: bool,
    /// Is the current branch's token stream suppressed.
    pub skipping: bool,
}

impl Conditional {
    #[must_use]
    pub fn new(kind: ConditionalKind, opened_line: usize, taken: bool, parent_skipping: bool) -> Self {
        Self {
            kind,
            opened_line,
            chosen: taken,
            skipping: parent_skipping || !taken,
        }
    }
}

/// A callback invoked when a frame is popped, handed the frame's owned
/// source text. Mirrors the original's `close_callback(data, ...)`.
pub type CloseCallback = Rc<dyn Fn(&str)>;

/// One entry on the include stack.
pub struct IncludeFrame {
    pub filename: Rc<str>,
    pub source: Rc<str>,
    pub cursor: usize,
    pub line: usize,
    pub conditionals: Vec<Conditional>,
    pub close_callback: Option<CloseCallback>,
    /// True for macro-expansion / predefined-macro sources, not a real `#include`.
    pub is_synthetic: bool,
}

impl IncludeFrame {
    #[must_use]
    pub fn bytes_remaining(&self) -> usize {
        self.source.len().saturating_sub(self.cursor)
    }

    #[must_use]
    pub fn is_skipping(&self) -> bool {
        self.conditionals.last().is_some_and(|c| c.skipping)
    }
}

/// Stack of active source frames.
#[derive(Default)]
pub struct IncludeStack {
    frames: Vec<IncludeFrame>,
}

impl IncludeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new frame on top, priming the cursor and setting the
    /// previous-token sentinel to newline so a `#` at offset 0 is
    /// recognized as a directive.
    pub fn push(
        &mut self,
        filename: Rc<str>,
        source: Rc<str>,
        starting_line: usize,
        close_callback: Option<CloseCallback>,
    ) {
        self.frames.push(IncludeFrame {
            filename,
            source,
            cursor: 0,
            line: starting_line,
            conditionals: Vec::new(),
            close_callback,
            is_synthetic: false,
        });
    }

    /// Pops the top frame, invoking its close callback with the owned
    /// source text. Returns the conditionals that were still open (the
    /// caller reports one "unterminated" diagnostic per entry).
    ///
    /// # Panics
    /// Panics if the stack is empty; popping an empty stack is a
    /// programming error, matching the documented contract.
    pub fn pop(&mut self) -> Vec<Conditional> {
        let frame = self.frames.pop().expect("pop called on empty include stack");
        log::trace!(target: "includium::include", "pop {} (depth now {})", frame.filename, self.frames.len());
        if let Some(close) = &frame.close_callback {
            close(&frame.source);
        }
        frame.conditionals
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn top(&self) -> Option<&IncludeFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut IncludeFrame> {
        self.frames.last_mut()
    }

    /// True if any frame, from innermost out, has a skipping conditional.
    #[must_use]
    pub fn is_skipping(&self) -> bool {
        self.frames.last().is_some_and(IncludeFrame::is_skipping)
    }

    /// The innermost real (non-synthetic) filename, used for `__FILE__`.
    #[must_use]
    pub fn innermost_real_filename(&self) -> Option<Rc<str>> {
        self.frames
            .iter()
            .rev()
            .find(|f| !f.is_synthetic)
            .map(|f| Rc::clone(&f.filename))
    }

    /// The innermost real line number, used for `__LINE__`.
    #[must_use]
    pub fn innermost_real_line(&self) -> Option<usize> {
        self.frames.iter().rev().find(|f| !f.is_synthetic).map(|f| f.line)
    }

    /// Filenames of every real (non-synthetic) frame, outermost first,
    /// used for `#include` cycle detection and the `IncludeContext`
    /// handed to a custom resolver.
    #[must_use]
    pub fn real_filenames(&self) -> Vec<Rc<str>> {
        self.frames.iter().filter(|f| !f.is_synthetic).map(|f| Rc::clone(&f.filename)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let mut stack = IncludeStack::new();
        stack.push(Rc::from("a.c"), Rc::from("int x;"), 1, None);
        assert_eq!(stack.depth(), 1);
        let leftover = stack.pop();
        assert!(leftover.is_empty());
        assert!(stack.is_empty());
    }

    #[test]
    fn close_callback_runs_on_pop() {
        use std::cell::RefCell;
        let seen = Rc::new(RefCell::new(String::new()));
        let seen_clone = Rc::clone(&seen);
        let mut stack = IncludeStack::new();
        stack.push(
            Rc::from("a.c"),
            Rc::from("hello"),
            1,
            Some(Rc::new(move |s: &str| *seen_clone.borrow_mut() = s.to_string())),
        );
        stack.pop();
        assert_eq!(*seen.borrow(), "hello");
    }

    #[test]
    fn unterminated_conditionals_are_returned_on_pop() {
        let mut stack = IncludeStack::new();
        stack.push(Rc::from("a.c"), Rc::from(""), 1, None);
        stack.top_mut().unwrap().conditionals.push(Conditional::new(ConditionalKind::If, 1, true, false));
        let leftover = stack.pop();
        assert_eq!(leftover.len(), 1);
    }
}
