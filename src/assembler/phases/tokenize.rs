use crate::assembler::cursor::Cursor;
use crate::assembler::diag::Diag;
use crate::spec::hw;
use derive_more::Constructor;
use std::fmt::Display;

const COMMENT_CHAR: char = ';';
const LABEL_CHAR: char = '.';
const SECTION_CHAR: char = '@';

// This enum models the kinds of tokens we can unambiguously distinguish
// while scanning. It *does not* model the semantics of the assembly
// language: registers, instruction names, and bare label references all
// come out as `Identifier`, and telling them apart is the encoder's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eol,
    Eof,
    Label,
    Section,
    IntLiteral,
    StringLiteral,
    Identifier,
}

/// One lexed token. `line` is the 1-based line the token started on;
/// `column` is the scan column at the moment the token was emitted
/// (columns reset to 0 at each newline and count consumed characters).
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::Eol => write!(f, "end of line"),
            TokenKind::Eof => write!(f, "end of file"),
            TokenKind::Label => write!(f, "label '.{}'", self.text),
            TokenKind::Section => write!(f, "section '@{}'", self.text),
            TokenKind::IntLiteral => write!(f, "integer literal '{}'", self.text),
            TokenKind::StringLiteral => write!(f, "string literal \"{}\"", self.text),
            TokenKind::Identifier => write!(f, "identifier '{}'", self.text),
        }
    }
}

/// Scans `source` into a token sequence, reporting problems to `diag`.
///
/// The sequence always ends with exactly one `Eof` token and never contains
/// two consecutive `Eol` tokens. Callers must hand over newline-terminated
/// text (`analyze` guarantees this); a truncated final line would otherwise
/// produce a truncated final token.
pub fn tokenize(source: &str, diag: &Diag) -> Vec<Token> {
    Lexer::new(source, diag).run()
}

struct Lexer<'a> {
    cursor: Cursor<char>,
    diag: &'a Diag,
    tokens: Vec<Token>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, diag: &'a Diag) -> Self {
        Lexer {
            cursor: Cursor::new(source.chars().collect()),
            diag,
            tokens: Vec::new(),
            line: 1,
            column: 0,
        }
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.cursor.peek().copied() {
            match c {
                c if c.is_whitespace() => self.scan_whitespace(),
                COMMENT_CHAR => self.scan_comment(),
                LABEL_CHAR => self.scan_name(TokenKind::Label, "label"),
                SECTION_CHAR => self.scan_name(TokenKind::Section, "section"),
                '"' | '\'' => self.scan_quoted(),
                c if c.is_ascii_digit() || c == '-' => self.scan_int(),
                c if c.is_ascii_alphabetic() => self.scan_identifier(),
                c => {
                    self.diag.error(
                        Some(self.line),
                        "invalid or unknown symbol",
                        Some(format!("'{}'", c)),
                    );
                    self.advance();
                }
            }
        }

        self.push(TokenKind::Eof, String::new(), self.line);
        self.tokens
    }

    /// Consumes one character, keeping the column count in step.
    fn advance(&mut self) -> char {
        let c = self.cursor.consume();
        self.column += 1;
        c
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize) {
        self.tokens.push(Token::new(kind, text, line, self.column));
    }

    fn push_eol(&mut self) {
        // runs of blank lines collapse into a single end-of-line token
        if let Some(last) = self.tokens.last() {
            if last.kind == TokenKind::Eol {
                return;
            }
        }
        self.push(TokenKind::Eol, String::new(), self.line);
    }

    /// Whitespace is consumed one character at a time so that every newline
    /// is individually observed for the line/column bookkeeping.
    fn scan_whitespace(&mut self) {
        let c = self.advance();
        if c == '\n' {
            self.push_eol();
            self.line += 1;
            self.column = 0;
        }
    }

    /// `;` through end of line, excluding the newline itself.
    fn scan_comment(&mut self) {
        while let Some(c) = self.cursor.peek().copied() {
            if c == '\n' {
                return;
            }
            self.advance();
        }
    }

    fn take_alnum(&mut self) -> String {
        let mut buf = String::new();
        while let Some(c) = self.cursor.peek().copied() {
            if !c.is_ascii_alphanumeric() {
                break;
            }
            buf.push(self.advance());
        }
        buf
    }

    /// Labels (`.name`) and sections (`@name`) share one scan, differing
    /// only in the emitted kind and the wording of the diagnostics.
    fn scan_name(&mut self, kind: TokenKind, what: &str) {
        let line = self.line;
        self.advance();
        let name = self.take_alnum();

        if name.is_empty() {
            self.diag
                .error(Some(line), format!("empty {} definition", what), None);
            return;
        }

        if name.starts_with(|c: char| c.is_ascii_digit()) {
            self.diag.error(
                Some(line),
                format!("{} name can't begin with a digit", what),
                Some(format!("'{}'", name)),
            );
            return;
        }

        self.push(kind, name, line);
    }

    fn resolve_escape(c: char) -> Option<char> {
        match c {
            '\'' => Some('\''),
            '"' => Some('"'),
            '\\' => Some('\\'),
            't' => Some('\t'),
            'n' => Some('\n'),
            '0' => Some('\0'),
            _ => None,
        }
    }

    fn scan_quoted(&mut self) {
        let line = self.line;
        let quote = self.advance();
        let mut buf = String::new();
        let mut closed = false;

        while let Some(c) = self.cursor.peek().copied() {
            if c == quote {
                self.advance();
                closed = true;
                break;
            }

            if c == '\n' {
                // abort without consuming; the outer loop reprocesses this
                // newline as an ordinary line break
                break;
            }

            if c == '\\' {
                self.advance();
                if let Some(escaped) = self.cursor.peek().copied() {
                    self.advance();
                    match Self::resolve_escape(escaped) {
                        Some(resolved) => buf.push(resolved),
                        None => {
                            self.diag.warning(
                                Some(line),
                                "unrecognized escape character",
                                Some(format!("'\\{}'", escaped)),
                            );
                            buf.push(escaped);
                        }
                    }
                }
                continue;
            }

            buf.push(self.advance());
        }

        if !closed {
            let what = if quote == '"' { "string" } else { "character" };
            self.diag.error(
                Some(line),
                format!("{} literal missing terminating {} character", what, quote),
                None,
            );
            return;
        }

        if quote == '"' {
            self.push(TokenKind::StringLiteral, buf, line);
            return;
        }

        let mut chars = buf.chars();
        match (chars.next(), chars.next()) {
            (None, _) => self.diag.error(Some(line), "empty character literal", None),
            (Some(_), Some(_)) => self.diag.error(
                Some(line),
                "character literal contains more than one character",
                Some(String::from(
                    "use a string literal (\"...\") for multi-character data",
                )),
            ),
            // reinterpreted as its ordinal value downstream
            (Some(c), None) => self.push(TokenKind::IntLiteral, c.to_string(), line),
        }
    }

    /// Integer literals: an optional `-`, then `0x`, `0b`, or plain decimal.
    /// The token text is always the normalized unsigned 16-bit decimal
    /// rendering, never the source spelling.
    fn scan_int(&mut self) {
        let line = self.line;
        let mut buf = String::new();
        buf.push(self.advance());
        // alphanumerics are swept in before the base is known, so hex and
        // binary digit letters land in the buffer too
        buf.push_str(&self.take_alnum());

        if buf == "-" {
            self.diag
                .error(Some(line), "empty integer literal after '-'", None);
            return;
        }

        let (negative, digits) = match buf.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, buf.as_str()),
        };

        let (radix, digits) = if let Some(hex) = digits.strip_prefix("0x") {
            if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return self.invalid_int(line, &buf);
            }
            (16, hex)
        } else if let Some(bin) = digits.strip_prefix("0b") {
            if bin.is_empty() || !bin.chars().all(|c| c == '0' || c == '1') {
                return self.invalid_int(line, &buf);
            }
            (2, bin)
        } else if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            (10, digits)
        } else {
            return self.invalid_int(line, &buf);
        };

        let parsed = match i64::from_str_radix(digits, radix) {
            Ok(parsed) => parsed,
            Err(_) => return self.invalid_int(line, &buf),
        };
        let value = if negative { -parsed } else { parsed };

        if value < i64::from(i16::MIN) {
            self.diag.warning(
                Some(line),
                "integer literal too small to be represented with 16 bits",
                Some(format!("'{}'", buf)),
            );
        } else if value > i64::from(hw::WORD_MAX) {
            self.diag.warning(
                Some(line),
                "integer literal too large to be represented with 16 bits",
                Some(format!("'{}'", buf)),
            );
        }

        let word = hw::word_from_i64_truncating(value);
        self.push(TokenKind::IntLiteral, word.to_string(), line);
    }

    fn invalid_int(&self, line: usize, raw: &str) {
        self.diag.error(
            Some(line),
            "invalid integer literal format",
            Some(format!(
                "'{}': only decimal, hexadecimal (0x) and binary (0b) literals are supported",
                raw
            )),
        );
    }

    /// No keyword classification happens here; see the note on `TokenKind`.
    fn scan_identifier(&mut self) {
        let line = self.line;
        let name = self.take_alnum();
        self.push(TokenKind::Identifier, name, line);
    }
}
