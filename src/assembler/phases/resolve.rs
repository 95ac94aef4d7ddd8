use crate::assembler::cursor::Cursor;
use crate::assembler::diag::Diag;
use crate::assembler::phases::tokenize::{Token, TokenKind};
use crate::spec::hw::{self, Byte, Word};
use derive_more::Constructor;
use std::collections::HashMap;
use strum_macros::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelKind {
    #[strum(serialize = "prog")]
    Program,
    #[strum(serialize = "data")]
    Data,
}

/// A defined symbol. Program labels mark an instruction-slot address;
/// data labels own the NUL-terminated bytes of their string block.
/// Created once on first successful definition and never mutated after
/// insertion; redefinitions are rejected and the original retained.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Label {
    pub name: String,
    pub line: usize,
    pub offset: Word,
    pub kind: LabelKind,
    pub data: Vec<Byte>,
}

/// The global symbol table. Names are unique across both label kinds;
/// `lookup` is the interface the downstream encoder resolves operand
/// references through.
#[derive(Debug, Default)]
pub struct LabelTable {
    labels: HashMap<String, Label>,
}

impl LabelTable {
    pub fn lookup(&self, name: &str) -> Option<&Label> {
        self.labels.get(name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    fn insert(&mut self, label: Label) {
        self.labels.insert(label.name.clone(), label);
    }
}

// Section dispatch is decided once, here, rather than by comparing the
// section name again at every diagnostic site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Program,
    Data,
}

impl SectionKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "prog" => Some(SectionKind::Program),
            "data" => Some(SectionKind::Data),
            _ => None,
        }
    }
}

/// Validates the section structure of `tokens` and builds the label table,
/// reporting problems to `diag`.
///
/// The returned table is only meaningful if the run stayed good: a failed
/// run's table is partial and callers must not treat it as usable.
pub fn resolve(tokens: &[Token], diag: &Diag) -> LabelTable {
    Resolver::new(tokens, diag).run()
}

struct Resolver<'a> {
    cursor: Cursor<Token>,
    diag: &'a Diag,
    table: LabelTable,
    prog_offset: Word,
    data_offset: Word,
    seen_prog: bool,
}

impl<'a> Resolver<'a> {
    fn new(tokens: &[Token], diag: &'a Diag) -> Self {
        Resolver {
            cursor: Cursor::new(tokens.to_vec()),
            diag,
            table: LabelTable::default(),
            prog_offset: 0,
            data_offset: 0,
            seen_prog: false,
        }
    }

    fn run(mut self) -> LabelTable {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Eol => {
                    self.cursor.consume();
                }
                TokenKind::Section => self.section(),
                _ => {
                    let tok = self.cursor.consume();
                    self.diag.error(
                        Some(tok.line),
                        "expected a section declaration",
                        Some(format!("found {}", tok)),
                    );
                    self.flush_line();
                }
            }
        }

        if !self.seen_prog {
            self.diag.error(None, "a program section was not found", None);
        }

        self.table
    }

    /// `Eof` doubles as the out-of-tokens answer, which keeps the loops
    /// total even on a stream that was truncated by hand.
    fn peek_kind(&self) -> TokenKind {
        self.cursor.peek().map_or(TokenKind::Eof, |t| t.kind)
    }

    /// Discards the remainder of the current line, including its
    /// terminating end-of-line token.
    fn flush_line(&mut self) {
        self.cursor
            .skip_until(|t| matches!(t.kind, TokenKind::Eol | TokenKind::Eof));
        if self.peek_kind() == TokenKind::Eol {
            self.cursor.consume();
        }
    }

    fn section(&mut self) {
        let tok = self.cursor.consume();

        if self.peek_kind() != TokenKind::Eol {
            self.diag.error(
                Some(tok.line),
                "expected newline after section declaration",
                None,
            );
            self.flush_line();
            return;
        }
        self.cursor.consume();

        match SectionKind::parse(&tok.text) {
            Some(SectionKind::Program) => {
                self.seen_prog = true;
                self.program_pass();
            }
            Some(SectionKind::Data) => self.data_pass(),
            None => {
                self.diag.error(
                    Some(tok.line),
                    format!("'{}' is not a valid section", tok.text),
                    Some(String::from("expected '@prog' or '@data'")),
                );
                self.cursor
                    .skip_until(|t| matches!(t.kind, TokenKind::Section | TokenKind::Eof));
            }
        }
    }

    /// Inserts a label, rejecting redefinitions in favor of the original.
    fn define(&mut self, tok: Token, kind: LabelKind, offset: Word, data: Vec<Byte>) {
        if let Some(original) = self.table.lookup(&tok.text) {
            self.diag.error(
                Some(tok.line),
                format!("redefinition of label '{}'", tok.text),
                Some(format!("first defined on line {}", original.line)),
            );
            return;
        }

        self.table
            .insert(Label::new(tok.text, tok.line, offset, kind, data));
    }

    /// Iterates program lines until the next section or end of input.
    ///
    /// Every line advances the running offset by the fixed instruction
    /// width, whether or not it defined a label and whether or not it was
    /// recovered from an error, so later labels land on correct addresses
    /// in a single forward pass. The instruction tokens themselves are
    /// discarded; encoding them is not this pass's concern.
    fn program_pass(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Section | TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.cursor.consume();
                }
                TokenKind::Label => {
                    let tok = self.cursor.consume();
                    if matches!(self.peek_kind(), TokenKind::Eol | TokenKind::Eof) {
                        self.diag.error(
                            Some(tok.line),
                            "expected instruction after label definition",
                            Some(format!("label '.{}'", tok.text)),
                        );
                    } else {
                        let offset = self.prog_offset;
                        self.define(tok, LabelKind::Program, offset, Vec::new());
                    }
                    self.flush_line();
                    self.prog_offset = self.prog_offset.wrapping_add(hw::INST_WIDTH);
                }
                _ => {
                    self.flush_line();
                    self.prog_offset = self.prog_offset.wrapping_add(hw::INST_WIDTH);
                }
            }
        }
    }

    /// Iterates data label blocks until the next section or end of input.
    fn data_pass(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Section | TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.cursor.consume();
                }
                TokenKind::Label => self.data_block(),
                _ => {
                    let tok = self.cursor.consume();
                    self.diag.error(
                        Some(tok.line),
                        "expected label definition",
                        Some(format!("found {}", tok)),
                    );
                    self.flush_line();
                }
            }
        }
    }

    /// One data block: a label line, then zero or more string-literal
    /// lines whose decoded bytes concatenate, then one NUL terminator.
    /// The block ends at the next label, section, or end of input.
    fn data_block(&mut self) {
        let tok = self.cursor.consume();

        if self.peek_kind() != TokenKind::Eol {
            self.diag.error(
                Some(tok.line),
                "expected newline after label definition",
                None,
            );
            self.flush_line();
            return;
        }
        self.cursor.consume();

        if let Some(original_line) = self.table.lookup(&tok.text).map(|l| l.line) {
            self.diag.error(
                Some(tok.line),
                format!("redefinition of label '{}'", tok.text),
                Some(format!("first defined on line {}", original_line)),
            );
            self.cursor.skip_until(|t| {
                matches!(
                    t.kind,
                    TokenKind::Label | TokenKind::Section | TokenKind::Eof
                )
            });
            return;
        }

        let mut data = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::StringLiteral => {
                    let lit = self.cursor.consume();
                    if self.peek_kind() == TokenKind::Eol {
                        self.cursor.consume();
                        data.extend_from_slice(lit.text.as_bytes());
                    } else {
                        self.diag.error(
                            Some(lit.line),
                            "expected newline after string literal",
                            None,
                        );
                        self.flush_line();
                    }
                }
                TokenKind::Eol => {
                    self.cursor.consume();
                }
                TokenKind::Label | TokenKind::Section | TokenKind::Eof => break,
                _ => {
                    let stray = self.cursor.consume();
                    self.diag.error(
                        Some(stray.line),
                        "unexpected token in data section",
                        Some(format!("found {}", stray)),
                    );
                    self.flush_line();
                }
            }
        }

        data.push(0);
        let offset = self.data_offset;
        let advance = data.len() as Word;
        self.define(tok, LabelKind::Data, offset, data);
        self.data_offset = self.data_offset.wrapping_add(advance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::diag::{Diag, MemorySink, Message, Verbosity};
    use crate::assembler::phases::tokenize;

    fn run(src: &str) -> (LabelTable, Vec<Message>, bool) {
        let sink = MemorySink::new();
        let msgs = sink.handle();
        let diag = Diag::new(Verbosity::Log, Box::new(sink));
        let tokens = tokenize::tokenize(src, &diag.named("lexer"));
        assert!(diag.good(), "lexer should not fail in resolver tests");
        let table = resolve(&tokens, &diag.named("resolver"));
        let collected = msgs.borrow().clone();
        (table, collected, diag.good())
    }

    #[test]
    fn program_labels_get_fixed_width_offsets() {
        let (table, _, good) = run(
            "@prog\n\
             .start mov a b\n\
             add a 1\n\
             .loop jmp loop\n",
        );
        assert!(good);
        assert_eq!(table.len(), 2);

        let start = table.lookup("start").unwrap();
        assert_eq!((start.offset, start.kind), (0, LabelKind::Program));
        assert!(start.data.is_empty());

        let l = table.lookup("loop").unwrap();
        assert_eq!((l.offset, l.line), (8, 4));
    }

    #[test]
    fn program_offsets_continue_across_sections() {
        let (table, _, good) = run(
            "@prog\n\
             nop\n\
             @data\n\
             @prog\n\
             .second nop\n",
        );
        assert!(good);
        assert_eq!(table.lookup("second").unwrap().offset, 4);
    }

    #[test]
    fn bare_label_fails_but_offsets_keep_advancing() {
        let (table, msgs, good) = run(
            "@prog\n\
             .a\n\
             .b nop\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0]
            .text
            .contains("expected instruction after label definition"));
        assert!(table.lookup("a").is_none());
        // the fixed-width advance happened for the failed line too
        assert_eq!(table.lookup("b").unwrap().offset, 4);
    }

    #[test]
    fn data_blocks_concatenate_and_terminate() {
        let (table, _, good) = run(
            "@prog\n\
             nop\n\
             @data\n\
             .greet\n\
             \"Hello, \"\n\
             \"world!\"\n\
             .empty\n\
             .bye\n\
             \"bye\"\n",
        );
        assert!(good);

        let greet = table.lookup("greet").unwrap();
        assert_eq!(greet.kind, LabelKind::Data);
        assert_eq!(greet.offset, 0);
        assert_eq!(greet.data, b"Hello, world!\0");

        let empty = table.lookup("empty").unwrap();
        assert_eq!(empty.offset, 14);
        assert_eq!(empty.data, b"\0");

        let bye = table.lookup("bye").unwrap();
        assert_eq!(bye.offset, 15);
        assert_eq!(bye.data, b"bye\0");
    }

    #[test]
    fn data_label_requires_its_own_line() {
        let (table, msgs, good) = run(
            "@prog\n\
             nop\n\
             @data\n\
             .greet \"hi\"\n",
        );
        assert!(!good);
        assert!(msgs[0].text.contains("expected newline after label definition"));
        assert!(table.lookup("greet").is_none());
    }

    #[test]
    fn stray_token_in_data_section() {
        let (_, msgs, good) = run(
            "@prog\n\
             nop\n\
             @data\n\
             .greet\n\
             mov\n",
        );
        assert!(!good);
        assert!(msgs[0].text.contains("unexpected token in data section"));
    }

    #[test]
    fn redefinition_in_same_section() {
        let (table, msgs, good) = run(
            "@prog\n\
             .start nop\n\
             .start nop\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("redefinition of label 'start'"));
        assert_eq!(msgs[0].detail.as_deref(), Some("first defined on line 2"));
        // the original definition wins
        assert_eq!(table.lookup("start").unwrap().offset, 0);
        assert_eq!(table.lookup("start").unwrap().line, 2);
    }

    #[test]
    fn redefinition_across_sections() {
        let (table, msgs, good) = run(
            "@prog\n\
             .x nop\n\
             @data\n\
             .x\n\
             \"payload\"\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("redefinition of label 'x'"));
        assert_eq!(table.lookup("x").unwrap().kind, LabelKind::Program);
    }

    #[test]
    fn duplicate_data_block_does_not_advance_offset() {
        let (table, _, good) = run(
            "@prog\n\
             nop\n\
             @data\n\
             .a\n\
             \"one\"\n\
             .a\n\
             \"two\"\n\
             .b\n\
             \"three\"\n",
        );
        assert!(!good);
        // the duplicate block's bytes were never materialized
        assert_eq!(table.lookup("a").unwrap().data, b"one\0");
        assert_eq!(table.lookup("b").unwrap().offset, 4);
    }

    #[test]
    fn unknown_section_recovers_at_next_section() {
        let (table, msgs, good) = run(
            "@bss\n\
             .junk nop\n\
             @prog\n\
             .start nop\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("'bss' is not a valid section"));
        assert!(table.lookup("junk").is_none());
        assert_eq!(table.lookup("start").unwrap().offset, 0);
    }

    #[test]
    fn section_requires_newline() {
        let (_, msgs, good) = run("@prog nop\n.l nop\n");
        assert!(!good);
        assert!(msgs[0]
            .text
            .contains("expected newline after section declaration"));
        // the line after the bad header is no longer inside a section
        assert!(msgs[1].text.contains("expected a section declaration"));
    }

    #[test]
    fn missing_program_section_is_fatal() {
        let (_, msgs, good) = run(
            "@data\n\
             .d\n\
             \"x\"\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("a program section was not found"));
        assert_eq!(msgs[0].line, None);
    }

    #[test]
    fn top_level_junk_flushes_to_next_line() {
        let (table, msgs, good) = run(
            "mov a b\n\
             @prog\n\
             .l nop\n",
        );
        assert!(!good);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("expected a section declaration"));
        assert_eq!(table.lookup("l").unwrap().offset, 0);
    }
}
