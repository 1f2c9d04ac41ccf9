//! Interactive session over one open store
//!
//! Each stdin line is parsed with the same clap definitions as the one-shot
//! commands, plus the session-only `undo`, `redo`, `history`, `save` and
//! `quit`. History lives only as long as the session.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use tcmkg_core::{GraphStore, PluginRegistry};
use tracing::debug;

use crate::{execute, StoreCommand};

#[derive(Parser)]
#[command(name = "tcmkg", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    #[command(flatten)]
    Store(StoreCommand),
    /// Revert the last change
    Undo,
    /// Re-apply the last undone change
    Redo,
    /// Show undo/redo depth and the graph version
    History,
    /// Write the graph file now
    Save,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

pub fn run(store: &mut GraphStore, plugins: &mut PluginRegistry) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!(
        "tcmkg shell on {} ({} nodes); 'help' lists commands, 'quit' leaves",
        store.path().display(),
        store.graph().node_count()
    );
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match run_line(store, plugins, &line) {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => println!("error: {err:#}"),
        }
        print!("> ");
        stdout.flush()?;
    }
    Ok(())
}

fn run_line(
    store: &mut GraphStore,
    plugins: &mut PluginRegistry,
    line: &str,
) -> anyhow::Result<Flow> {
    let words = split_words(line);
    if words.is_empty() || words[0].starts_with('#') {
        return Ok(Flow::Continue);
    }

    let parsed = match ShellLine::try_parse_from(&words) {
        Ok(parsed) => parsed,
        Err(err) => {
            // help and usage errors are printed, not fatal
            println!("{err}");
            return Ok(Flow::Continue);
        }
    };
    debug!(line, "shell command");

    match parsed.command {
        ShellCommand::Store(command) => execute(store, plugins, command)?,
        ShellCommand::Undo => {
            if store.undo()? {
                println!("undone (version {})", store.version());
            } else {
                println!("nothing to undo");
            }
        }
        ShellCommand::Redo => {
            if store.redo()? {
                println!("redone (version {})", store.version());
            } else {
                println!("nothing to redo");
            }
        }
        ShellCommand::History => {
            let history = store.history();
            println!(
                "version {}: {} undo / {} redo (capacity {})",
                store.version(),
                history.undo_len(),
                history.redo_len(),
                history.capacity()
            );
        }
        ShellCommand::Save => {
            store.save()?;
            println!("saved {}", store.path().display());
        }
        ShellCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

/// Split a shell line into words.
///
/// Single quotes keep their content literally, double quotes allow `\`
/// escapes, and a backslash outside quotes escapes the next character.
/// An unterminated quote runs to the end of the line.
fn split_words(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    // a quoted empty string ('') is still a word
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('"'), '"') => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    out.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        out.push(current);
    }
    out
}
