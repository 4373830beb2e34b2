//! Interactive menu.
//!
//! [`step`] is a pure transition function from `(state, input)` to the next
//! state plus the effects to perform. [`Menu`] owns the session data and is the
//! only part that touches the terminal, the segment source and the gateway.

use crate::cmd::apply::{confirm_prompt, progress_line, write_action_preview, write_execution};
use crate::cmd::scan::{NO_DUPLICATES, write_groups};
use crate::context::RunContext;
use anyhow::Result;
use crossterm::QueueableCommand;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use segclean_core::dump::write_dump;
use segclean_core::{Action, NameFilter, Plan, Segment, execute};
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::{debug, info, warn};

pub const INVALID_SELECTION: &str = "Invalid input: Please type a number 1 - 7";
pub const NOT_RECOGNIZED: &str = "Input not recognized. Type \"continue\" or \"abort\".";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Idle,
    Filtering,
    Confirming(Action),
    Diagnostic,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SetFilter(String),
    ClearFilter,
    Execute(Action),
    Dump,
    /// Re-fetch the store and rebuild the plan.
    Refresh,
    Notice(&'static str),
}

/// Next state and effects for one line of input.
pub fn step(state: MenuState, input: &str) -> (MenuState, Vec<Effect>) {
    let input = input.trim();
    match state {
        MenuState::Idle => match input {
            "1" => (MenuState::Filtering, vec![]),
            "2" => (MenuState::Idle, vec![Effect::ClearFilter]),
            "3" => (MenuState::Confirming(Action::MergeDelete), vec![]),
            "4" => (MenuState::Confirming(Action::MergeOnly), vec![]),
            "5" => (MenuState::Confirming(Action::DeleteOnly), vec![]),
            "6" => (MenuState::Exit, vec![]),
            "7" => (MenuState::Diagnostic, vec![]),
            _ => (MenuState::Idle, vec![Effect::Notice(INVALID_SELECTION)]),
        },
        MenuState::Filtering => {
            if input == "exit" {
                (MenuState::Idle, vec![])
            } else {
                (MenuState::Idle, vec![Effect::SetFilter(input.to_string())])
            }
        }
        MenuState::Confirming(action) => {
            if input.eq_ignore_ascii_case("continue") {
                (
                    MenuState::Idle,
                    vec![Effect::Execute(action), Effect::ClearFilter, Effect::Refresh],
                )
            } else if input.eq_ignore_ascii_case("abort") {
                (MenuState::Idle, vec![])
            } else {
                (state, vec![Effect::Notice(NOT_RECOGNIZED)])
            }
        }
        MenuState::Diagnostic => {
            if input == "q" {
                (MenuState::Idle, vec![Effect::Dump])
            } else {
                (MenuState::Diagnostic, vec![])
            }
        }
        MenuState::Exit => (MenuState::Exit, vec![]),
    }
}

/// Session data for one interactive run.
pub struct Menu<'a> {
    ctx: &'a RunContext,
    store: Vec<Segment>,
    unfiltered: Plan,
    filter: NameFilter,
    plan: Plan,
    notice: Option<String>,
}

impl<'a> Menu<'a> {
    pub fn open(ctx: &'a RunContext) -> Result<Self> {
        let mut menu = Self {
            ctx,
            store: Vec::new(),
            unfiltered: Plan::default(),
            filter: NameFilter::none(),
            plan: Plan::default(),
            notice: None,
        };
        menu.refresh()?;

        if let Some(search) = ctx.filter_search() {
            menu.set_filter(search);
        }
        Ok(menu)
    }

    fn refresh(&mut self) -> Result<()> {
        self.store = self.ctx.fetch()?;
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        self.unfiltered = Plan::build(&self.store, &NameFilter::none(), self.ctx.policy);
        self.plan = if self.filter.is_empty() {
            self.unfiltered.clone()
        } else {
            Plan::build(&self.store, &self.filter, self.ctx.policy)
        };
    }

    /// Apply a search. Returns `false` and leaves the filter alone on no match.
    fn set_filter(&mut self, search: &str) -> bool {
        match NameFilter::from_search(search, &self.unfiltered.classification.base_names) {
            Some(filter) => {
                debug!(search, names = filter.names().len(), "filter set");
                self.filter = filter;
                self.rebuild();
                true
            }
            None => {
                self.notice = Some(format!("No matches found for '{search}'"));
                false
            }
        }
    }

    fn clear_filter(&mut self) {
        self.filter = NameFilter::none();
        self.rebuild();
    }

    /// Run the menu on the real terminal.
    pub fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let clear = stdout.is_terminal();
        self.drive(&mut stdin.lock(), &mut stdout.lock(), clear)
    }

    /// Loop until the user quits, input ends or nothing is left to clean.
    pub fn drive(&mut self, input: &mut dyn BufRead, out: &mut dyn Write, clear: bool) -> Result<()> {
        let mut state = if self.unfiltered.is_empty() {
            write_exhausted(out)?;
            MenuState::Exit
        } else {
            MenuState::Idle
        };

        while state != MenuState::Exit {
            if clear {
                out.queue(Clear(ClearType::All))?.queue(MoveTo(0, 0))?;
            }
            self.render(state, out)?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                debug!("input closed, leaving menu");
                break;
            }

            let (next, effects) = step(state, &line);
            state = next;
            for effect in effects {
                if let Some(forced) = self.perform(effect, out)? {
                    state = forced;
                }
            }
        }
        Ok(())
    }

    /// Carry out one effect. May force a different next state.
    fn perform(&mut self, effect: Effect, out: &mut dyn Write) -> Result<Option<MenuState>> {
        match effect {
            Effect::SetFilter(search) => {
                if !self.set_filter(&search) {
                    return Ok(Some(MenuState::Filtering));
                }
            }
            Effect::ClearFilter => self.clear_filter(),
            Effect::Execute(action) => {
                let gateway = self.ctx.gateway()?;
                let runner = self.ctx.runner();
                let mut write_err = None;
                let execution = execute(&self.plan, action, &runner, gateway.as_ref(), |kind, item| {
                    if let Err(err) = writeln!(out, "{}", progress_line(kind, item)) {
                        write_err.get_or_insert(err);
                    }
                });
                if let Some(err) = write_err {
                    return Err(err.into());
                }

                let mut summary = Vec::new();
                write_execution(&mut summary, &execution)?;
                if let Some(code) = execution.failure_code() {
                    warn!(%action, failed = execution.failed(), "action finished with failures");
                    writeln!(summary, "{} item(s) failed [{code}]", execution.failed())?;
                }
                self.notice = Some(String::from_utf8_lossy(&summary).trim().to_string());
            }
            Effect::Dump => {
                let dir = self.ctx.dump_dir(None);
                self.notice = Some(match write_dump(&dir, &self.plan) {
                    Ok(paths) => format!(
                        "Wrote {} and {}",
                        paths.update_list.display(),
                        paths.diagnostic.display()
                    ),
                    Err(err) => format!("error[{}]: {err}", err.code()),
                });
            }
            Effect::Refresh => {
                self.refresh()?;
                if self.unfiltered.is_empty() {
                    info!("nothing left to clean");
                    write_exhausted(out)?;
                    return Ok(Some(MenuState::Exit));
                }
            }
            Effect::Notice(text) => self.notice = Some(text.to_string()),
        }
        Ok(None)
    }

    fn render(&mut self, state: MenuState, out: &mut dyn Write) -> io::Result<()> {
        if let Some(notice) = self.notice.take() {
            writeln!(out, "{notice}")?;
            writeln!(out)?;
        }

        match state {
            MenuState::Idle => {
                write_groups(out, &self.plan)?;
                writeln!(out)?;
                writeln!(out, "--------Options----------")?;
                writeln!(out)?;
                writeln!(out, "filter: '{}'", self.filter.search())?;
                writeln!(out)?;
                writeln!(out, "1. Add text filter to search")?;
                writeln!(out, "2. Clear filter")?;
                writeln!(out, "3. Merge and delete")?;
                writeln!(out, "4. Merge only")?;
                writeln!(out, "5. Delete only")?;
                writeln!(out, "6. Quit")?;
                writeln!(out, "7. Diag")?;
                writeln!(out)?;
                writeln!(out, "Choose an option: 1 - 7")
            }
            MenuState::Filtering => {
                write_groups(out, &self.plan)?;
                writeln!(out)?;
                writeln!(out, "---Set Filter---")?;
                writeln!(
                    out,
                    "Type keyword or base segment name to filter search (Case Sensitive).  Type \"exit\" to go back"
                )
            }
            MenuState::Confirming(action) => {
                write_action_preview(out, &self.plan, action)?;
                write!(out, "{}", confirm_prompt(action))
            }
            MenuState::Diagnostic => self.write_diagnostic(out),
            MenuState::Exit => Ok(()),
        }
    }

    fn write_diagnostic(&self, out: &mut dyn Write) -> io::Result<()> {
        let classification = &self.plan.classification;
        writeln!(out, "-----diagnostic-----")?;
        writeln!(out)?;
        write_list(out, "filter", self.filter.names().iter())?;
        write_list(out, "base names", classification.base_names.iter())?;
        write_list(out, "duplicate names", classification.duplicate_names.iter())?;
        writeln!(out, "updates")?;
        writeln!(out, "len: {}", self.plan.updates().len())?;
        writeln!(out)?;
        write_list(out, "delete ids", self.plan.deletes().iter())?;
        write_list(
            out,
            "held back ids",
            self.plan.held_back().iter().map(|held| &held.id),
        )?;
        if !self.plan.issues().is_empty() {
            writeln!(out, "issues")?;
            for issue in self.plan.issues() {
                writeln!(out, "  {issue}")?;
            }
            writeln!(out)?;
        }
        writeln!(
            out,
            "Type q to quit and write {}...",
            self.ctx.dump_dir(None).display()
        )
    }
}

fn write_list<'s>(
    out: &mut dyn Write,
    label: &str,
    items: impl Iterator<Item = &'s String>,
) -> io::Result<()> {
    let items: Vec<&str> = items.map(String::as_str).collect();
    writeln!(out, "{label}")?;
    writeln!(out, "len: {}", items.len())?;
    writeln!(out, "{items:?}")?;
    writeln!(out)
}

fn write_exhausted(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{NO_DUPLICATES}")?;
    writeln!(out)?;
    writeln!(out, "Exiting application.")
}

pub fn run_menu(ctx: &RunContext) -> Result<()> {
    Menu::open(ctx)?.run()
}
