use ansi_term::{Color, Style};
use derive_more::Constructor;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Log,
}

/// How much a run reports, in increasing order. Gating is by comparison:
/// a message is emitted to the sink iff its severity's threshold is at or
/// below the configured verbosity.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[strum(serialize_all = "lowercase")]
pub enum Verbosity {
    None,
    Error,
    Warning,
    Log,
}

impl Severity {
    fn threshold(self) -> Verbosity {
        match self {
            Severity::Error => Verbosity::Error,
            Severity::Warning => Verbosity::Warning,
            Severity::Log => Verbosity::Log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct Message {
    pub severity: Severity,
    pub component: String,
    pub line: Option<usize>,
    pub text: String,
    pub detail: Option<String>,
}

pub trait Sink {
    fn emit(&mut self, msg: &Message);
}

/// Renders messages to stderr, colored per severity.
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn emit(&mut self, msg: &Message) {
        let tag = match msg.severity {
            Severity::Error => Color::Red.bold().paint("error"),
            Severity::Warning => Color::Yellow.bold().paint("warning"),
            Severity::Log => Style::new().dimmed().paint("log"),
        };

        match msg.line {
            Some(line) => eprint!("{}:{}: {}: {}", msg.component, line, tag, msg.text),
            None => eprint!("{}: {}: {}", msg.component, tag, msg.text),
        }

        match &msg.detail {
            Some(detail) => eprintln!(" ({})", detail),
            None => eprintln!(),
        }
    }
}

/// Records every emitted message behind a shared handle, so tests can
/// inspect what a pass reported.
#[derive(Default)]
pub struct MemorySink {
    messages: Rc<RefCell<Vec<Message>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Rc<RefCell<Vec<Message>>> {
        Rc::clone(&self.messages)
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, msg: &Message) {
        self.messages.borrow_mut().push(msg.clone());
    }
}

struct Channel {
    verbosity: Verbosity,
    success: Cell<bool>,
    sink: RefCell<Box<dyn Sink>>,
}

/// A named handle onto one run's diagnostic state.
///
/// Handles derived with `named` share the sink, the verbosity, and the
/// success flag with their parent, so the whole pipeline reports into one
/// stream and fails as one. The pipeline is single-threaded (the lexer runs
/// to completion before the resolver starts), hence `Rc`/`Cell`.
#[derive(Clone)]
pub struct Diag {
    channel: Rc<Channel>,
    component: String,
}

impl Diag {
    pub fn new(verbosity: Verbosity, sink: Box<dyn Sink>) -> Self {
        Diag {
            channel: Rc::new(Channel {
                verbosity,
                success: Cell::new(true),
                sink: RefCell::new(sink),
            }),
            component: String::from("tasm"),
        }
    }

    pub fn console(verbosity: Verbosity) -> Self {
        Diag::new(verbosity, Box::new(ConsoleSink))
    }

    /// Derives a sub-logger reporting under its own component name.
    pub fn named(&self, component: impl Into<String>) -> Diag {
        Diag {
            channel: Rc::clone(&self.channel),
            component: component.into(),
        }
    }

    pub fn good(&self) -> bool {
        self.channel.success.get()
    }

    /// Fatal: permanently marks the run unsuccessful, even when the
    /// configured verbosity suppresses the message itself.
    pub fn error(&self, line: Option<usize>, text: impl Into<String>, detail: Option<String>) {
        self.channel.success.set(false);
        self.report(Severity::Error, line, text.into(), detail);
    }

    /// Advisory: never affects the success flag.
    pub fn warning(&self, line: Option<usize>, text: impl Into<String>, detail: Option<String>) {
        self.report(Severity::Warning, line, text.into(), detail);
    }

    pub fn log(&self, line: Option<usize>, text: impl Into<String>, detail: Option<String>) {
        self.report(Severity::Log, line, text.into(), detail);
    }

    fn report(&self, severity: Severity, line: Option<usize>, text: String, detail: Option<String>) {
        if severity.threshold() > self.channel.verbosity {
            return;
        }

        let msg = Message::new(severity, self.component.clone(), line, text, detail);
        self.channel.sink.borrow_mut().emit(&msg);
    }
}
