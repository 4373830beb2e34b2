use crate::context::{RunContext, describe_config};
use crate::output::{pretty_kv, pretty_section, render};
use anyhow::Result;
use segclean_core::Plan;
use segclean_core::merge::{MatchPolicy, MergeIssue};
use segclean_core::payload::HeldBack;
use segclean_core::plan::{Group, PlanSummary};
use serde::Serialize;
use std::io::{self, Write};

pub const NO_DUPLICATES: &str = "No duplicate application segments found...";

#[derive(Debug, Serialize)]
struct ScanOutput<'a> {
    source: String,
    filter: &'a str,
    policy: MatchPolicy,
    summary: PlanSummary,
    groups: Vec<Group>,
    orphan_bases: Vec<&'a str>,
    delete_ids: &'a [String],
    held_back: &'a [HeldBack],
    issues: &'a [MergeIssue],
}

/// Numbered base segments with their duplicates, followed by the search count.
pub fn write_groups(w: &mut dyn Write, plan: &Plan) -> io::Result<()> {
    for (n, group) in plan.groups().iter().enumerate() {
        writeln!(w, "{}:", n + 1)?;
        writeln!(w, "{}", group.base_name)?;
        for duplicate in &group.duplicates {
            if plan.deletes_name(duplicate) {
                writeln!(w, " > {duplicate}")?;
            } else {
                writeln!(w, " > {duplicate} (held back)")?;
            }
        }
        writeln!(w)?;
    }

    let orphans = plan.orphan_bases();
    if !orphans.is_empty() {
        writeln!(w, "Duplicates with no mergeable base segment (delete only):")?;
        for base in orphans {
            for duplicate in plan.classification.duplicates_of(base) {
                writeln!(w, " > {duplicate}")?;
            }
        }
        writeln!(w)?;
    }

    let held_back = plan.held_back();
    if !held_back.is_empty() {
        writeln!(w, "Held back from deletion (lists not merged):")?;
        for held in held_back {
            writeln!(w, " > {} ({}) -> {}", held.name, held.id, held.base_name)?;
        }
        writeln!(w)?;
    }

    for issue in plan.issues() {
        writeln!(w, "warning: {issue}")?;
    }
    if !plan.issues().is_empty() {
        writeln!(w)?;
    }

    writeln!(
        w,
        "Search found {} application segment(s) that have one or more duplicates",
        plan.updates().len()
    )
}

fn write_summary(w: &mut dyn Write, output: &ScanOutput<'_>) -> io::Result<()> {
    pretty_section(w, "Scan")?;
    pretty_kv(w, "source", &output.source)?;
    pretty_kv(
        w,
        "filter",
        if output.filter.is_empty() {
            "(none)"
        } else {
            output.filter
        },
    )?;
    pretty_kv(w, "match", output.policy.as_str())?;
    pretty_kv(w, "updates", output.summary.updates.to_string())?;
    pretty_kv(w, "deletes", output.summary.deletes.to_string())?;
    pretty_kv(w, "held back", output.summary.held_back.to_string())?;
    pretty_kv(w, "issues", output.summary.issues.to_string())?;
    writeln!(w)
}

pub fn run_scan(ctx: &RunContext) -> Result<()> {
    let plan = ctx.load_plan()?;

    if plan.is_empty() && !ctx.output.is_json() {
        println!("{NO_DUPLICATES}");
        return Ok(());
    }

    let output = ScanOutput {
        source: format!(
            "{} (config: {})",
            ctx.source().describe(),
            describe_config(ctx.config_path.as_deref())
        ),
        filter: plan.filter.search(),
        policy: plan.policy,
        summary: plan.summary(),
        groups: plan.groups(),
        orphan_bases: plan.orphan_bases(),
        delete_ids: plan.deletes(),
        held_back: plan.held_back(),
        issues: plan.issues(),
    };

    let mode = ctx.output;
    render(mode, &output, |out, w| {
        if mode.is_pretty() {
            write_summary(w, out)?;
        }
        write_groups(w, &plan)
    })
}
