use crate::assembler::{
    self,
    diag::{Diag, Verbosity},
    Analysis, LabelKind, LabelTable,
};
use anyhow::Context;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[cfg(windows)]
pub fn terminal_init() {
    env_logger::init();
    ansi_term::enable_ansi_support().expect("could not enable terminal ANSI support");
}

#[cfg(not(windows))]
pub fn terminal_init() {
    env_logger::init();
}

#[derive(StructOpt, Debug)]
#[structopt(name = "tasm")]
pub enum CommandRoot {
    /// Run the assembler front end over a source file and report diagnostics
    Check(SubcommandCheck),
    /// Dump the token stream the lexer produces for a source file
    Tokens(SubcommandTokens),
    /// Dump the resolved label table for a source file
    Symbols(SubcommandSymbols),
}

#[derive(StructOpt, Debug)]
pub struct SubcommandCheck {
    #[structopt(name = "in.asm", parse(from_os_str))]
    in_src: PathBuf,

    /// How much to report: none, error, warning, or log
    #[structopt(short, long, default_value = "warning")]
    verbosity: Verbosity,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandTokens {
    #[structopt(name = "in.asm", parse(from_os_str))]
    in_src: PathBuf,

    #[structopt(short, long, default_value = "error")]
    verbosity: Verbosity,
}

#[derive(StructOpt, Debug)]
pub struct SubcommandSymbols {
    #[structopt(name = "in.asm", parse(from_os_str))]
    in_src: PathBuf,

    /// Write the table here instead of to stdout
    #[structopt(name = "out.sym", parse(from_os_str))]
    out_sym: Option<PathBuf>,

    #[structopt(short, long, default_value = "warning")]
    verbosity: Verbosity,
}

pub fn root(cmd: CommandRoot) -> ! {
    let result = match cmd {
        CommandRoot::Check(scmd) => check(scmd),
        CommandRoot::Tokens(scmd) => tokens(scmd),
        CommandRoot::Symbols(scmd) => symbols(scmd),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!(
                "{}: {:#}",
                ansi_term::Color::Red.bold().paint("error"),
                err
            );
            std::process::exit(2);
        }
    }
}

fn load_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("could not read source file '{}'", path.display()))
}

/// Runs the front end over a file; `None` means the run failed and its
/// diagnostics have already been rendered to the console.
fn analyze_path(path: &Path, verbosity: Verbosity) -> anyhow::Result<Option<Analysis>> {
    let src = load_source(path)?;
    let diag = Diag::console(verbosity);
    match assembler::analyze(&src, &diag) {
        Ok(analysis) => Ok(Some(analysis)),
        Err(err) => {
            log::debug!("{}", err);
            Ok(None)
        }
    }
}

fn check(cmd: SubcommandCheck) -> anyhow::Result<i32> {
    Ok(match analyze_path(&cmd.in_src, cmd.verbosity)? {
        Some(_) => 0,
        None => 1,
    })
}

fn tokens(cmd: SubcommandTokens) -> anyhow::Result<i32> {
    let src = load_source(&cmd.in_src)?;
    let diag = Diag::console(cmd.verbosity);
    match assembler::lex(&src, &diag) {
        Err(_) => Ok(1),
        Ok(toks) => {
            for tok in &toks {
                println!("{}:{}: {}", tok.line, tok.column, tok);
            }
            Ok(0)
        }
    }
}

fn symbols(cmd: SubcommandSymbols) -> anyhow::Result<i32> {
    match analyze_path(&cmd.in_src, cmd.verbosity)? {
        None => Ok(1),
        Some(analysis) => {
            let dump = render_symbols(&analysis.labels);
            match cmd.out_sym {
                Some(path) => std::fs::write(&path, dump)
                    .with_context(|| format!("could not write symbol file '{}'", path.display()))?,
                None => print!("{}", dump),
            }
            Ok(0)
        }
    }
}

fn render_symbols(labels: &LabelTable) -> String {
    let mut out = String::new();
    for label in labels.iter().sorted_by_key(|l| (l.kind, l.offset)) {
        match label.kind {
            LabelKind::Program => out.push_str(&format!(
                "{:#06x} {} .{} (line {})\n",
                label.offset, label.kind, label.name, label.line
            )),
            LabelKind::Data => out.push_str(&format!(
                "{:#06x} {} .{} (line {}, {} bytes)\n",
                label.offset,
                label.kind,
                label.name,
                label.line,
                label.data.len()
            )),
        }
    }
    out
}
