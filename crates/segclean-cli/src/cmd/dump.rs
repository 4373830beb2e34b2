use crate::context::RunContext;
use crate::output::{CliError, render, render_error};
use anyhow::Result;
use clap::Args;
use segclean_core::dump::{DumpPaths, write_dump};
use std::io::Write;
use std::path::PathBuf;

/// Arguments for `segclean dump`.
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Directory for `update_list.json` and `diagnostic.json` (default from config).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn run_dump(args: &DumpArgs, ctx: &RunContext) -> Result<()> {
    let plan = ctx.load_plan()?;
    let dir = ctx.dump_dir(args.dir.as_deref());

    let paths = match write_dump(&dir, &plan) {
        Ok(paths) => paths,
        Err(err) => {
            render_error(ctx.output, &CliError::from_code(err.code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    render(ctx.output, &paths, |p: &DumpPaths, w| {
        writeln!(w, "Wrote {}", p.update_list.display())?;
        writeln!(w, "Wrote {}", p.diagnostic.display())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DumpArgs,
    }

    #[test]
    fn dir_is_optional() {
        assert!(Wrapper::parse_from(["test"]).args.dir.is_none());
        let w = Wrapper::parse_from(["test", "--dir", "out"]);
        assert_eq!(w.args.dir, Some(PathBuf::from("out")));
    }
}
