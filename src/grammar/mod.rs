//! Grammar fragments for request spec files.
//!
//! The document grammar (`shared.pest` + `main.pest`) is compiled into the
//! crate with `pest_derive`. The request tail grammar depends on the
//! multipart boundary of each request, so it is assembled from
//! `tail.pest` + `shared.pest` plus two generated productions and compiled
//! at runtime with `pest_vm`.

use pest::error::Error;
use pest_meta::optimizer;
use pest_meta::parser::{self as meta, Rule as MetaRule};
use pest_meta::validator;
use pest_vm::Vm;


pub const SHARED: &str = include_str!("shared.pest");
pub const MAIN: &str = include_str!("main.pest");
pub const TAIL: &str = include_str!("tail.pest");

/// Entry rule of the tail grammar.
pub const TAIL_ENTRY: &str = "request_tail";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Shared,
    Main,
    Tail,
}

impl Fragment {
    pub fn source(self) -> &'static str {
        match self {
            Fragment::Shared => SHARED,
            Fragment::Main => MAIN,
            Fragment::Tail => TAIL,
        }
    }
}

/// Concatenates grammar fragments, in order, into one grammar source.
pub fn load_grammar(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|fragment| fragment.source())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The `BOUNDARY` and `CONTENT_LINE` productions for a request.
///
/// Without a boundary, `BOUNDARY` can never match, so a tail can only hold
/// a flat body.
pub fn tail_productions(boundary: Option<&str>) -> String {
    let content_guard = r####""###" | "< " | ">" ~ (" " | "\t" | "STATUS" | "{%") | "<> ""####;
    match boundary {
        Some(boundary) => {
            let boundary = escape(boundary);
            format!(
                "BOUNDARY = @{{ \"{boundary}\" }}\n\
                 CONTENT_LINE = @{{ !({guard} | \"--{boundary}\") ~ (!NEWLINE ~ ANY)+ }}\n",
                boundary = boundary,
                guard = content_guard
            )
        }
        None => format!(
            "BOUNDARY = @{{ !ANY ~ ANY }}\n\
             CONTENT_LINE = @{{ !({guard}) ~ (!NEWLINE ~ ANY)+ }}\n",
            guard = content_guard
        ),
    }
}

/// Full source of the tail grammar specialized for `boundary`.
pub fn tail_grammar(boundary: Option<&str>) -> String {
    let mut grammar = load_grammar(&[Fragment::Tail, Fragment::Shared]);
    grammar.push('\n');
    grammar.push_str(&tail_productions(boundary));
    grammar
}

/// Compiles a grammar source into a parsing VM.
pub fn compile(grammar: &str) -> Result<Vm, Vec<Error<MetaRule>>> {
    let pairs = meta::parse(MetaRule::grammar_rules, grammar).map_err(|e| vec![e])?;
    validator::validate_pairs(pairs.clone())?;
    let ast = meta::consume_rules(pairs)?;
    Ok(Vm::new(optimizer::optimize(ast)))
}

fn escape(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c == '\\' || c == '"' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
