//! Batch codemod that rewrites `translations.*` property accesses into
//! `t()` calls and injects the matching i18next import.
//!
//! The rewrite engine parses each candidate file with swc, runs a single
//! mutable pass over the tree, and regenerates the source by splicing the
//! recorded edits back into the original text, so untouched regions survive
//! byte-for-byte. Changed files are reported as unified diffs; nothing is
//! written back to disk.

use std::{
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use swc_core::{
    common::{sync::Lrc, BytePos, FileName, SourceMap, Span, Spanned, DUMMY_SP, SyntaxContext},
    ecma::{
        ast::*,
        parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax},
        visit::{Visit, VisitMut, VisitMutWith, VisitWith},
    },
};
use tokio::task::{spawn_local, LocalSet};
use tracing::{debug, info, trace};
use walkdir::WalkDir;

// -----------------------------------------------------------------------------
// Globals
// -----------------------------------------------------------------------------

/// Identifier (or string-literal value) marking a receiver chain for rewriting.
const TRANSLATIONS: &str = "translations";
/// Callee of the generated call expression.
const HELPER_FN: &str = "t";
/// Module the helper is imported from.
const HELPER_MODULE: &str = "i18next";

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QuoteStyle {
    #[default]
    Single,
    Double,
}

/// Formatting preference for generated snippets (the term literal and the
/// injected import). Regions the rewriter does not touch keep whatever
/// formatting the original file had.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodegenStyle {
    pub quote: QuoteStyle,
}

impl CodegenStyle {
    fn string_literal(&self, value: &str) -> String {
        let quote = match self.quote {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
        };
        let mut out = String::with_capacity(value.len() + 2);
        out.push(quote);
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }
}

pub struct Config {
    /// Directory the walk starts from.
    pub root: PathBuf,
    /// Pattern selecting candidate files by full path.
    pub match_pattern: Regex,
    /// Paths matching any of these are skipped before being read.
    pub ignore_patterns: Vec<Regex>,
    pub style: CodegenStyle,
}

impl Config {
    fn is_ignored(&self, path: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p.is_match(path))
    }
}

/// What happened to one candidate file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Unchanged,
    Changed { diff: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum CodemodError {
    #[error("parsing failed for file {}:{line}:{column}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
}

// -----------------------------------------------------------------------------
// Per-file context
// -----------------------------------------------------------------------------

/// Source-position bookkeeping for one file, threaded through the scan and
/// rewrite passes instead of any process-wide "current file" state.
struct FileContext {
    path: PathBuf,
    cm: Lrc<SourceMap>,
    start: BytePos,
}

impl FileContext {
    fn loc(&self, span: Span) -> String {
        if span.is_dummy() {
            return format!("{}:0:0", self.path.display());
        }
        let lo = self.cm.lookup_char_pos(span.lo());
        format!("{}:{}:{}", self.path.display(), lo.line, lo.col_display)
    }

    /// Byte range of a span within the file's own text.
    fn byte_range(&self, span: Span) -> Range<usize> {
        (span.lo().0 - self.start.0) as usize..(span.hi().0 - self.start.0) as usize
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

fn parse_module_source(
    path: &Path,
    src: &str,
) -> Result<(Lrc<SourceMap>, BytePos, Module), CodemodError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Real(path.to_path_buf())), src.to_owned());
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        }),
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let parsed = parser.parse_module();
    // Errors the parser recovered from are still malformed input to us.
    let mut recovered = parser.take_errors();
    let module = match parsed {
        Ok(module) if recovered.is_empty() => module,
        Ok(_) => return Err(parse_error(path, &cm, recovered.remove(0))),
        Err(e) => return Err(parse_error(path, &cm, e)),
    };
    Ok((cm, fm.start_pos, module))
}

fn parse_error(
    path: &Path,
    cm: &SourceMap,
    e: swc_core::ecma::parser::error::Error,
) -> CodemodError {
    let (line, column) = if e.span().is_dummy() {
        (0, 0)
    } else {
        let lo = cm.lookup_char_pos(e.span().lo());
        (lo.line, lo.col_display)
    };
    CodemodError::Parse {
        path: path.to_path_buf(),
        line,
        column,
        message: e.into_kind().msg().into_owned(),
    }
}

// -----------------------------------------------------------------------------
// Minimal-diff printing
// -----------------------------------------------------------------------------

/// A localized change to the original text. Everything outside the recorded
/// ranges is carried over byte-for-byte when the file is regenerated.
#[derive(Debug)]
enum Edit {
    Insert { pos: usize, text: String },
    Replace { range: Range<usize>, text: String },
}

impl Edit {
    fn sort_position(&self) -> usize {
        match self {
            Edit::Insert { pos, .. } => *pos,
            Edit::Replace { range, .. } => range.start,
        }
    }
}

// Edit ranges are disjoint: a committed rewrite never descends into the
// sub-tree it replaced, and the import line lands on a statement boundary.
fn apply_edits(src: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| std::cmp::Reverse(e.sort_position()));
    let mut out = src.to_owned();
    for edit in edits {
        match edit {
            Edit::Insert { pos, text } => out.insert_str(pos, &text),
            Edit::Replace { range, text } => out.replace_range(range, &text),
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Sentinel scan
// -----------------------------------------------------------------------------

/// Walks one receiver sub-tree (root included) looking for the marker name.
/// The scan never leaves the sub-tree it was handed; sibling expressions are
/// the caller's business.
#[derive(Default)]
struct TranslationsFinder {
    first_match: Option<Span>,
}

impl TranslationsFinder {
    fn record(&mut self, span: Span) {
        if self.first_match.is_none() {
            self.first_match = Some(span);
        }
    }
}

impl Visit for TranslationsFinder {
    fn visit_ident(&mut self, n: &Ident) {
        if n.sym.as_ref() == TRANSLATIONS {
            self.record(n.span);
        }
    }

    fn visit_ident_name(&mut self, n: &IdentName) {
        if n.sym.as_ref() == TRANSLATIONS {
            self.record(n.span);
        }
    }

    fn visit_str(&mut self, n: &Str) {
        if n.value.as_ref() == TRANSLATIONS {
            self.record(n.span);
        }
    }
}

fn subtree_mentions_translations(expr: &Expr) -> Option<Span> {
    let mut finder = TranslationsFinder::default();
    expr.visit_with(&mut finder);
    finder.first_match
}

// -----------------------------------------------------------------------------
// Rewrite rule
// -----------------------------------------------------------------------------

struct TranslationsRewriter<'a> {
    ctx: &'a FileContext,
    src: &'a str,
    style: CodegenStyle,
    edits: Vec<Edit>,
    committed: bool,
    logged_usage: bool,
}

impl<'a> TranslationsRewriter<'a> {
    fn new(ctx: &'a FileContext, src: &'a str, style: CodegenStyle) -> Self {
        Self {
            ctx,
            src,
            style,
            edits: Vec::new(),
            committed: false,
            logged_usage: false,
        }
    }

    /// Receiver exclusion: a freshly constructed array or a call result is
    /// never the reference chain the rule targets.
    fn receiver_excluded(obj: &Expr) -> bool {
        let mut receiver = obj;
        while let Expr::Paren(paren) = receiver {
            receiver = &paren.expr;
        }
        matches!(receiver, Expr::Array(_) | Expr::Call(_))
    }

    fn try_rewrite(&mut self, node: &MemberExpr) -> Option<CallExpr> {
        if Self::receiver_excluded(&node.obj) {
            return None;
        }
        let marker = subtree_mentions_translations(&node.obj)?;
        if !self.logged_usage {
            debug!("translations usage found for file: {}", self.ctx.loc(marker));
            self.logged_usage = true;
        }
        let (term, term_text) = match &node.prop {
            MemberProp::Ident(name) => (
                Expr::Lit(Lit::Str(Str {
                    span: DUMMY_SP,
                    value: name.sym.clone(),
                    raw: None,
                })),
                self.style.string_literal(name.sym.as_ref()),
            ),
            // Computed keys are already expressions; carry them verbatim.
            MemberProp::Computed(computed) => (
                (*computed.expr).clone(),
                self.src[self.ctx.byte_range(computed.expr.span())].to_owned(),
            ),
            // `obj.#x` has no term a call argument could legally carry.
            MemberProp::PrivateName(_) => return None,
        };
        debug!(
            "found an interpolated term \"{}\" in file: {}",
            term_text.trim(),
            self.ctx.loc(node.span)
        );
        self.edits.push(Edit::Replace {
            range: self.ctx.byte_range(node.span),
            text: format!("{HELPER_FN}({term_text})"),
        });
        self.committed = true;
        Some(CallExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            callee: Callee::Expr(Box::new(Expr::Ident(Ident::new(
                HELPER_FN.into(),
                DUMMY_SP,
                SyntaxContext::empty(),
            )))),
            args: vec![ExprOrSpread {
                spread: None,
                expr: Box::new(term),
            }],
            type_args: None,
        })
    }
}

impl VisitMut for TranslationsRewriter<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if let Expr::Member(member) = expr {
            if let Some(call) = self.try_rewrite(member) {
                // Single pass: the replacement call is not revisited.
                *expr = Expr::Call(call);
                return;
            }
        }
        expr.visit_mut_children_with(self);
    }
}

// -----------------------------------------------------------------------------
// Import injection
// -----------------------------------------------------------------------------

/// Inserts `import { t } from 'i18next'` right after the last import
/// declaration, or at the top when there is none. Callers invoke this at most
/// once per file; the function does not probe for an existing helper import.
fn inject_helper_import(
    module: &mut Module,
    ctx: &FileContext,
    src: &str,
    style: CodegenStyle,
    edits: &mut Vec<Edit>,
) {
    let last_import = module
        .body
        .iter()
        .rposition(|item| matches!(item, ModuleItem::ModuleDecl(ModuleDecl::Import(_))));

    let stmt_text = format!(
        "import {{ {HELPER_FN} }} from {};",
        style.string_literal(HELPER_MODULE)
    );
    match last_import {
        Some(idx) => {
            let import_end = ctx.byte_range(module.body[idx].span()).end;
            let line_end = src[import_end..]
                .find('\n')
                .map_or(src.len(), |off| import_end + off);
            edits.push(Edit::Insert {
                pos: line_end,
                text: format!("\n{stmt_text}"),
            });
        }
        // A shebang stays on the first line.
        None if module.shebang.is_some() => match src.find('\n') {
            Some(nl) => edits.push(Edit::Insert {
                pos: nl + 1,
                text: format!("{stmt_text}\n"),
            }),
            None => edits.push(Edit::Insert {
                pos: src.len(),
                text: format!("\n{stmt_text}\n"),
            }),
        },
        None => edits.push(Edit::Insert {
            pos: 0,
            text: format!("{stmt_text}\n"),
        }),
    }

    let decl = ModuleItem::ModuleDecl(ModuleDecl::Import(ImportDecl {
        span: DUMMY_SP,
        specifiers: vec![ImportSpecifier::Named(ImportNamedSpecifier {
            span: DUMMY_SP,
            local: Ident::new(HELPER_FN.into(), DUMMY_SP, SyntaxContext::empty()),
            imported: None,
            is_type_only: false,
        })],
        src: Box::new(Str {
            span: DUMMY_SP,
            value: HELPER_MODULE.into(),
            raw: None,
        }),
        type_only: false,
        with: None,
        phase: ImportPhase::Evaluation,
    }));
    module.body.insert(last_import.map_or(0, |idx| idx + 1), decl);
}

// -----------------------------------------------------------------------------
// File transformer
// -----------------------------------------------------------------------------

/// Runs the parse → scan/rewrite → inject → reprint pipeline over one file's
/// source. Returns the new text when it differs from the input.
pub fn rewrite_source(
    path: &Path,
    src: &str,
    style: CodegenStyle,
) -> Result<Option<String>, CodemodError> {
    trace!("parsing file: {}", path.display());
    let (cm, start, mut module) = parse_module_source(path, src)?;
    let ctx = FileContext {
        path: path.to_path_buf(),
        cm,
        start,
    };

    let mut rewriter = TranslationsRewriter::new(&ctx, src, style);
    module.visit_mut_with(&mut rewriter);
    let TranslationsRewriter {
        mut edits,
        committed,
        ..
    } = rewriter;

    if committed {
        inject_helper_import(&mut module, &ctx, src, style, &mut edits);
    }

    let printed = apply_edits(src, edits);
    if printed == src {
        Ok(None)
    } else {
        Ok(Some(printed))
    }
}

// -----------------------------------------------------------------------------
// Diff report
// -----------------------------------------------------------------------------

pub fn unified_diff(path: &Path, before: &str, after: &str) -> String {
    use std::fmt::Write;

    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();
    writeln!(out, "--- {}", path.display()).unwrap();
    writeln!(out, "+++ {}", path.display()).unwrap();
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        writeln!(out, "{}", hunk.header()).unwrap();
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            write!(out, "{sign}{change}").unwrap();
            if change.missing_newline() {
                writeln!(out).unwrap();
            }
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Batch driver
// -----------------------------------------------------------------------------

/// Reads and transforms one candidate file. Read and parse failures are fatal
/// to the whole run; ignored files are skipped before any read happens.
pub async fn process_file(path: PathBuf, config: Arc<Config>) -> Result<Outcome> {
    let display_path = path.to_string_lossy().into_owned();
    if config.is_ignored(&display_path) {
        trace!("ignoring file: {display_path}");
        return Ok(Outcome::Skipped);
    }
    let src = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {display_path}"))?;
    match rewrite_source(&path, &src, config.style)? {
        Some(printed) => {
            let diff = unified_diff(&path, &src, &printed);
            info!("codemod successful for file: {display_path}\n{diff}");
            Ok(Outcome::Changed { diff })
        }
        None => Ok(Outcome::Unchanged),
    }
}

/// Walks the tree under `config.root` and dispatches every candidate file's
/// pipeline as its own task, without waiting for earlier files. The first
/// failed task aborts the run; tasks still in flight are dropped with it.
pub async fn run(config: Config) -> Result<RunSummary> {
    let config = Arc::new(config);
    let local = LocalSet::new();
    local
        .run_until(async move {
            let mut handles = Vec::new();
            for entry in WalkDir::new(&config.root) {
                let entry = entry.context("directory walk failed")?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                if !config.match_pattern.is_match(&path.to_string_lossy()) {
                    continue;
                }
                handles.push(spawn_local(process_file(path, Arc::clone(&config))));
            }

            let mut summary = RunSummary::default();
            for handle in handles {
                match handle.await.context("file task failed")?? {
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::Unchanged => summary.unchanged += 1,
                    Outcome::Changed { .. } => summary.changed += 1,
                }
            }
            debug!(
                "run finished: {} changed, {} unchanged, {} skipped",
                summary.changed, summary.unchanged, summary.skipped
            );
            Ok(summary)
        })
        .await
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
