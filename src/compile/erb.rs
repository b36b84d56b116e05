//! The ERB front-end.
//!
//! Splits the source into text and `<% %>` tags and feeds the builder:
//!
//! - `<%= expr %>` writes the value of the expression.
//! - `<% code %>` runs statements, which may open and close blocks.
//! - `<%# comment %>` is ignored.
//! - `<%%` is a literal `<%`.
//! - `<%-` removes the indentation before the tag and `-%>` removes the line
//!   break after it, when trimming is enabled.

use crate::compile::build::Builder;
use crate::compile::parse::Parser;
use crate::types::ast;
use crate::types::options::ErbOptions;
use crate::types::span::Span;
use crate::{Error, Result};

const BEGIN: &str = "<%";
const END: &str = "%>";

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(internal_debug, derive(Debug))]
enum Tag {
    Output,
    Code,
    Comment,
}

pub fn parse_template(source: &str, options: &ErbOptions) -> Result<ast::Template> {
    let mut builder = Builder::new(source);
    let mut cursor = 0;
    // Whether the text after the previous tag starts with a trimmed newline.
    let mut right_trim = false;

    while let Some(j) = find(source, BEGIN, cursor) {
        let mut text = &source[cursor..j];
        if right_trim {
            text = trim_newline(text);
            right_trim = false;
        }

        // `<%%` is a literal
        if source[j + BEGIN.len()..].starts_with('%') {
            builder.raw(text);
            builder.raw(BEGIN);
            cursor = j + BEGIN.len() + 1;
            continue;
        }

        let mut m = j + BEGIN.len();
        let tag = match source[m..].chars().next() {
            Some('=') => {
                m += 1;
                Tag::Output
            }
            Some('#') => {
                m += 1;
                Tag::Comment
            }
            _ => Tag::Code,
        };
        if source[m..].starts_with('-') {
            m += 1;
            if options.trim {
                text = trim_indent(text);
            }
        }
        builder.raw(text);

        let k = find(source, END, m)
            .ok_or_else(|| Error::syntax("unclosed tag", source, j..j + BEGIN.len()))?;
        let mut n = k;
        if k > m && source[..k].ends_with('-') {
            n -= 1;
            right_trim = options.trim;
        }
        cursor = k + END.len();

        let span = Span::from(m..n);
        match tag {
            Tag::Comment => {}
            Tag::Output => {
                let (code, span) = Parser::new(source, span, options.buffer()).parse_output()?;
                builder.code(code, span)?;
            }
            Tag::Code => {
                for (code, span) in Parser::new(source, span, options.buffer()).parse_codes()? {
                    builder.code(code, span)?;
                }
            }
        }
    }

    let mut text = &source[cursor..];
    if right_trim {
        text = trim_newline(text);
    }
    builder.raw(text);
    builder.finish()
}

fn find(source: &str, pat: &str, i: usize) -> Option<usize> {
    source[i..].find(pat).map(|d| i + d)
}

/// Removes a single line break from the start of the text.
fn trim_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

/// Removes spaces and tabs from the end of the text if they follow a line
/// break or the start of the template.
fn trim_indent(text: &str) -> &str {
    let trimmed = text.trim_end_matches([' ', '\t']);
    if trimmed.is_empty() || trimmed.ends_with('\n') {
        trimmed
    } else {
        text
    }
}
