/*!
 * Argument Tokenizer
 * Splits a command line into an owned argument vector and derives the
 * null-terminated view exec calls expect
 */

use crate::core::errors::{PoolError, PoolResult};
use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::c_char;
use std::ptr;

/// Owned tokens of one command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgVector {
    tokens: Vec<String>,
}

/// Split `command` on runs of C-locale whitespace
///
/// No quoting or escaping: every token is exactly one whitespace-delimited
/// field. Leading, trailing and repeated whitespace never yield empty tokens.
/// Only space, `\t`, `\n`, `\v`, `\f` and `\r` separate fields; other
/// Unicode spaces such as U+00A0 stay inside the token.
pub fn tokenize(command: &str) -> ArgVector {
    ArgVector {
        tokens: command
            .split(is_separator)
            .filter(|field| !field.is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

impl ArgVector {
    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Slots needed by an exec-style vector: every token plus the null sentinel
    pub fn slot_count(&self) -> usize {
        self.tokens.len() + 1
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn program(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Build the null-terminated view handed to `execvp`
    pub fn to_exec(&self) -> PoolResult<ExecArgv> {
        if self.tokens.is_empty() {
            return Err(PoolError::InvalidCommand("empty command".to_string()));
        }

        let args = self
            .tokens
            .iter()
            .map(|token| {
                CString::new(token.as_bytes()).map_err(|_| {
                    PoolError::InvalidCommand(format!("token contains a NUL byte: {:?}", token))
                })
            })
            .collect::<PoolResult<Vec<_>>>()?;

        let mut slots: Vec<*const c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        slots.push(ptr::null());

        Ok(ExecArgv { args, slots })
    }
}

impl From<&str> for ArgVector {
    fn from(command: &str) -> Self {
        tokenize(command)
    }
}

impl fmt::Display for ArgVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// C-compatible argument vector
///
/// Owns its strings; `slots` points into them and ends with a null pointer.
/// The heap buffers of `args` never move, so the pointers stay valid for
/// the lifetime of the value.
#[derive(Debug)]
pub struct ExecArgv {
    args: Vec<CString>,
    slots: Vec<*const c_char>,
}

impl ExecArgv {
    pub fn program(&self) -> &CStr {
        &self.args[0]
    }

    /// Pointer slots including the trailing null sentinel
    pub fn slots(&self) -> &[*const c_char] {
        &self.slots
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.slots.as_ptr()
    }
}
