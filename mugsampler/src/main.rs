use colored::Colorize;
use mugsampler::command_argument_builder;
use mugsampler::handlers::{handle_collect, handle_reset, handle_run, handle_status, print_banner};
use mugsampler_core::RunOutcome;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("run", primary_command)) => match handle_run(primary_command).await {
            // Exhausted runs exit 2 so scripts can tell them apart
            Ok(RunOutcome::Exhausted(_)) => std::process::exit(2),
            Ok(RunOutcome::Satisfied) => Ok(()),
            Err(e) => Err(e),
        },
        Some(("collect", primary_command)) => handle_collect(primary_command).await.map(|_| ()),
        Some(("status", primary_command)) => handle_status(primary_command),
        Some(("reset", primary_command)) => handle_reset(primary_command),
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
