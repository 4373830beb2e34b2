use crate::cmd::scan::{NO_DUPLICATES, write_groups};
use crate::context::RunContext;
use crate::output::{CliError, render, render_error};
use anyhow::Result;
use clap::Args;
use segclean_core::error::ErrorCode;
use segclean_core::gateway::{BatchKind, ItemResult, Outcome};
use segclean_core::{Action, Execution, Plan, execute};
use std::io::{self, BufRead, Write};
use tracing::info;

/// Arguments for `segclean apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// What to do with the plan: merge-delete, merge or delete.
    #[arg(long, default_value = "merge-delete")]
    pub mode: Action,

    /// Skip the `continue`/`abort` confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Answer to a `continue`/`abort` prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Continue,
    Abort,
}

/// Parse one line of confirmation input. Anything unrecognized is `None`.
pub fn parse_confirmation(input: &str) -> Option<Confirmation> {
    let answer = input.trim().to_ascii_lowercase();
    match answer.as_str() {
        "continue" => Some(Confirmation::Continue),
        "abort" => Some(Confirmation::Abort),
        _ => None,
    }
}

/// Lists what an action will touch, as shown before confirming.
pub fn write_action_preview(w: &mut dyn Write, plan: &Plan, action: Action) -> io::Result<()> {
    writeln!(w, "--------------{}----------------", action.title())?;
    writeln!(w)?;
    if action.merges() {
        writeln!(w, "The following base segment(s) will be merged:")?;
        writeln!(w)?;
        for segment in plan.updates() {
            writeln!(w, " > {}", segment.name)?;
        }
        writeln!(w)?;
    }
    if action.deletes() {
        writeln!(w, "The following duplicate segment(s) will be deleted:")?;
        writeln!(w)?;
        for name in &plan.classification.duplicate_names {
            if plan.deletes_name(name) {
                writeln!(w, " > {name}")?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Prompt text for `action`.
pub fn confirm_prompt(action: Action) -> String {
    let verb = match action {
        Action::MergeDelete => "execute merge and delete operation",
        Action::MergeOnly => "merge to base segment",
        Action::DeleteOnly => "delete duplicate segments",
    };
    format!("Type \"continue\" to {verb}, or \"abort\" to cancel: ")
}

/// Ask until the user types `continue` or `abort`. End of input aborts.
fn confirm(input: &mut dyn BufRead, err: &mut dyn Write, action: Action) -> Result<Confirmation> {
    loop {
        write!(err, "{}", confirm_prompt(action))?;
        err.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Confirmation::Abort);
        }
        match parse_confirmation(&line) {
            Some(answer) => return Ok(answer),
            None => writeln!(err, "Input not recognized. Type \"continue\" or \"abort\".")?,
        }
    }
}

/// The line printed as each item completes.
pub fn progress_line(kind: BatchKind, item: &ItemResult) -> String {
    match (&item.outcome, kind) {
        (Outcome::Applied, BatchKind::Update) => format!("Updated: {}", item.label()),
        (Outcome::Applied, BatchKind::Delete) => format!("Deleted: {}", item.id),
        (Outcome::AlreadyGone, _) => format!("Already deleted: {}", item.id),
        (Outcome::Failed { error }, BatchKind::Update) => {
            format!("Failed to update {}: {error}", item.label())
        }
        (Outcome::Failed { error }, BatchKind::Delete) => {
            format!("Failed to delete {}: {error}", item.id)
        }
    }
}

/// Closing lines for an execution, matching the per-batch completion notices.
pub fn write_execution(w: &mut dyn Write, execution: &Execution) -> io::Result<()> {
    for report in execution.reports() {
        writeln!(w)?;
        let noun = match report.kind {
            BatchKind::Update => "Update",
            BatchKind::Delete => "Delete",
        };
        writeln!(
            w,
            "{noun} Operation Complete. applied={} already_gone={} failed={}",
            report.applied(),
            report.already_gone(),
            report.failed()
        )?;
    }
    Ok(())
}

/// Run `action` and stream progress lines unless output is JSON.
pub fn run_action(ctx: &RunContext, plan: &Plan, action: Action) -> Result<Execution> {
    let gateway = ctx.gateway()?;
    let runner = ctx.runner();
    let stream = !ctx.output.is_json();
    let execution = execute(plan, action, &runner, gateway.as_ref(), |kind, item| {
        if stream {
            println!("{}", progress_line(kind, item));
        }
    });
    info!(%action, failed = execution.failed(), dry_run = ctx.dry_run, "action finished");
    Ok(execution)
}

pub fn run_apply(args: &ApplyArgs, ctx: &RunContext) -> Result<()> {
    let plan = ctx.load_plan()?;
    if plan.is_empty() {
        if !ctx.output.is_json() {
            println!("{NO_DUPLICATES}");
        }
        return Ok(());
    }

    if !args.yes {
        let stderr = io::stderr();
        let mut err = stderr.lock();
        write_groups(&mut err, &plan)?;
        writeln!(err)?;
        write_action_preview(&mut err, &plan, args.mode)?;

        let stdin = io::stdin();
        if confirm(&mut stdin.lock(), &mut err, args.mode)? == Confirmation::Abort {
            drop(err);
            render_error(
                ctx.output,
                &CliError::from_code(ErrorCode::Aborted, format!("{} aborted", args.mode)),
            )?;
            anyhow::bail!("{} aborted", args.mode);
        }
    }

    let execution = run_action(ctx, &plan, args.mode)?;

    let mode = ctx.output;
    render(mode, &execution, |e, w| {
        write_execution(w, e)?;
        if mode.is_pretty() && ctx.dry_run {
            writeln!(w, "(dry run: nothing was sent)")?;
        }
        Ok(())
    })?;

    if let Some(code) = execution.failure_code() {
        let message = format!("{} item(s) failed", execution.failed());
        render_error(ctx.output, &CliError::from_code(code, message.clone()))?;
        anyhow::bail!(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use segclean_core::gateway::BatchReport;
    use segclean_core::model::ListField;
    use segclean_core::{MatchPolicy, NameFilter, Segment};
    use std::io::Cursor;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ApplyArgs,
    }

    #[test]
    fn apply_args_default_to_merge_delete() {
        let w = Wrapper::parse_from(["test"]);
        assert_eq!(w.args.mode, Action::MergeDelete);
        assert!(!w.args.yes);

        let w = Wrapper::parse_from(["test", "--mode", "delete", "--yes"]);
        assert_eq!(w.args.mode, Action::DeleteOnly);
        assert!(w.args.yes);

        assert!(Wrapper::try_parse_from(["test", "--mode", "purge"]).is_err());
    }

    #[test]
    fn confirmation_is_case_insensitive() {
        assert_eq!(parse_confirmation("Continue\n"), Some(Confirmation::Continue));
        assert_eq!(parse_confirmation("ABORT"), Some(Confirmation::Abort));
        assert_eq!(parse_confirmation("yes"), None);
    }

    #[test]
    fn confirm_reprompts_until_recognized() {
        let mut input = Cursor::new("maybe\n\ncontinue\n");
        let mut err = Vec::new();
        let answer = confirm(&mut input, &mut err, Action::MergeOnly).expect("confirm");
        assert_eq!(answer, Confirmation::Continue);

        let text = String::from_utf8(err).expect("utf8");
        assert_eq!(text.matches("Input not recognized").count(), 2);
        assert!(text.contains("merge to base segment"));
    }

    #[test]
    fn end_of_input_aborts() {
        let mut input = Cursor::new("");
        let mut err = Vec::new();
        let answer = confirm(&mut input, &mut err, Action::DeleteOnly).expect("confirm");
        assert_eq!(answer, Confirmation::Abort);
    }

    #[test]
    fn preview_lists_only_what_the_action_touches() {
        let segments = vec![Segment::host_app("1", "A"), Segment::host_app("2", "A-1")];
        let plan = Plan::build(&segments, &NameFilter::none(), MatchPolicy::Contains);

        let mut buf = Vec::new();
        write_action_preview(&mut buf, &plan, Action::DeleteOnly).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(!text.contains("will be merged"));
        assert!(text.contains(" > A-1"));
    }

    #[test]
    fn preview_omits_held_back_duplicates() {
        let segments = vec![
            Segment::host_app("1", "A"),
            Segment::host_app("2", "A-1").without(ListField::AppNames),
            Segment::host_app("3", "A-2"),
        ];
        let plan = Plan::build(&segments, &NameFilter::none(), MatchPolicy::Contains);

        let mut buf = Vec::new();
        write_action_preview(&mut buf, &plan, Action::MergeDelete).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains(" > A-2"));
        assert!(!text.contains(" > A-1"));
    }

    #[test]
    fn progress_lines_name_the_item() {
        let updated = ItemResult {
            id: "1".into(),
            name: Some("crm".into()),
            outcome: Outcome::Applied,
        };
        assert_eq!(progress_line(BatchKind::Update, &updated), "Updated: crm");

        let deleted = ItemResult {
            id: "9".into(),
            name: None,
            outcome: Outcome::Applied,
        };
        assert_eq!(progress_line(BatchKind::Delete, &deleted), "Deleted: 9");

        let failed = ItemResult {
            id: "9".into(),
            name: None,
            outcome: Outcome::Failed {
                error: "HTTP 500".into(),
            },
        };
        assert_eq!(
            progress_line(BatchKind::Delete, &failed),
            "Failed to delete 9: HTTP 500"
        );
    }

    #[test]
    fn execution_summary_has_one_line_per_batch() {
        let execution = Execution {
            action: Action::MergeDelete,
            updates: Some(BatchReport::new(BatchKind::Update)),
            deletes: Some(BatchReport::new(BatchKind::Delete)),
        };
        let mut buf = Vec::new();
        write_execution(&mut buf, &execution).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Update Operation Complete."));
        assert!(text.contains("Delete Operation Complete."));
    }
}
