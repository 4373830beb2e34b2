#![forbid(unsafe_code)]

mod client;
mod cmd;
mod context;
mod menu;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use context::{GlobalOptions, RunContext};
use segclean_core::{MatchPolicy, timing};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "segclean: merge numbered duplicate application segments into their base and delete the rest",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: SEGCLEAN_CONFIG, ./config.yaml, then the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read segments from a local JSON snapshot instead of the API.
    #[arg(long, global = true, value_name = "PATH")]
    from_file: Option<PathBuf>,

    /// Only process base segments whose name contains this text (case-sensitive).
    #[arg(long, global = true, value_name = "TEXT")]
    filter: Option<String>,

    /// Which segments feed a base: `contains` (any name containing it) or `suffix`.
    #[arg(long = "match", global = true, value_name = "POLICY")]
    policy: Option<MatchPolicy>,

    /// Record mutations instead of sending them.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            from_file: self.from_file.clone(),
            filter: self.filter.clone(),
            policy: self.policy,
            dry_run: self.dry_run,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Interactive menu (default)",
        long_about = "Show duplicates and choose to filter, merge, delete or inspect them.",
        after_help = "EXAMPLES:\n    # Start the menu against the configured API\n    segclean\n\n    # Try it on a local snapshot without sending anything\n    segclean --from-file JSON/my_collection.json --dry-run menu"
    )]
    Menu,

    #[command(
        about = "Show what would be merged and deleted",
        long_about = "Fetch segments, classify duplicates and print the merge/delete plan.",
        after_help = "EXAMPLES:\n    # Plan for every base segment\n    segclean scan\n\n    # Only bases containing \"crm\", strict suffix matching\n    segclean scan --filter crm --match suffix\n\n    # Emit machine-readable output\n    segclean scan --json"
    )]
    Scan,

    #[command(
        about = "Merge and/or delete without the menu",
        long_about = "Execute one action over the plan. Asks for \"continue\" or \"abort\" unless --yes is given.",
        after_help = "EXAMPLES:\n    # Merge duplicates into their bases, then delete them\n    segclean apply --mode merge-delete\n\n    # Delete only, no prompt\n    segclean apply --mode delete --yes\n\n    # Rehearse against a snapshot\n    segclean --from-file store.json apply --dry-run --yes"
    )]
    Apply(cmd::apply::ApplyArgs),

    #[command(
        about = "Write the diagnostic snapshot",
        long_about = "Write update_list.json and diagnostic.json for the current plan.",
        after_help = "EXAMPLES:\n    # Write into the configured diagnostics directory\n    segclean dump\n\n    # Write somewhere else\n    segclean dump --dir /tmp/segclean"
    )]
    Dump(cmd::dump::DumpArgs),

    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    segclean completions bash > /etc/bash_completion.d/segclean"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("SEGCLEAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "segclean=debug,info"
        } else {
            "segclean=info,warn"
        })
    });

    let format = env::var("SEGCLEAN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::enabled_from_env();
    timing::set_enabled(timing_enabled);
    timing::clear();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = output::resolve_output_mode(cli.json);
    let options = cli.global_options();

    let command_result = match cli.command {
        Some(Commands::Completions(args)) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
        Some(Commands::Scan) => timing::timed("cmd.scan", || {
            let ctx = RunContext::open(&options, output)?;
            cmd::scan::run_scan(&ctx)
        }),
        Some(Commands::Apply(ref args)) => timing::timed("cmd.apply", || {
            let ctx = RunContext::open(&options, output)?;
            cmd::apply::run_apply(args, &ctx)
        }),
        Some(Commands::Dump(ref args)) => timing::timed("cmd.dump", || {
            let ctx = RunContext::open(&options, output)?;
            cmd::dump::run_dump(args, &ctx)
        }),
        Some(Commands::Menu) | None => timing::timed("cmd.menu", || {
            let ctx = RunContext::open(&options, output)?;
            menu::run_menu(&ctx)
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    command_result
}
