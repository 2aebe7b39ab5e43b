use clap::Parser;
use log::debug;
use shell_facade_core::adapter::Reply;
use shell_facade_core::error::{Error, Result};
use shell_facade_core::{config, file_handling, shell, SharedConfig};
use std::io::{stdout, Write};
use std::process::ExitCode;

use shell_facade_cli::cli_args::Args;
use shell_facade_cli::invocation::{exit_status, Plan};

/// Load the configuration file and apply the command-line overrides
fn initialize_config(args: &Args) -> Result<SharedConfig> {
    let config_path = config::get_config_path(&args.config_path);
    debug!("Config path: `{}`", config_path);

    let mut shell_config = file_handling::get_shell_config(&config_path)?;
    args.apply_to(&mut shell_config);

    Ok(SharedConfig::new(shell_config))
}

/// Runs the command. `streamed` is set once it is known whether the
/// command's output goes to the terminal while it runs.
async fn execute(args: Args, streamed: &mut bool) -> Result<()> {
    let target = args.target()?;
    let config = initialize_config(&args)?;
    let root = shell(config.clone());
    let plan = Plan::resolve(&root, &target)?;

    if args.dry_run {
        println!(
            "Dry run is specified, exiting without executing:\n{}",
            plan.describe(&args.arguments)
        );
        return Ok(());
    }

    *streamed = !config.snapshot().silent && plan.streams_output();
    let options = args.exec_options();
    let reply = plan.run(args.arguments, options).await?;

    print_reply(&reply, *streamed)
}

fn print_reply(reply: &Reply, streamed: bool) -> Result<()> {
    let mut stdout = stdout();
    match reply {
        // Streamed output already reached the terminal.
        Reply::Shell(_) if streamed => {}
        Reply::Shell(result) => write!(stdout, "{result}")?,
        Reply::Value(_) => writeln!(stdout, "{}", reply.to_text())?,
    }
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let mut streamed = false;

    match execute(args, &mut streamed).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Shell(e)) => {
            if !streamed || !e.is_command_failure() {
                print!("{}", e.stdout);
                eprintln!("{}", e.message.trim_end());
            }
            ExitCode::from(exit_status(&e))
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
