//! Release command — thin CLI layer over `shiplog_core::release`.

use std::io::IsTerminal;

use anyhow::{Context, bail};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use shiplog_core::config::Config;
use shiplog_core::git;
use shiplog_core::release::{
    self, ReleaseEvent, ReleaseOptions, ReleaseOutcome, ReleasePlan, StepOutcome,
};

use crate::Cli;

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn run(cli: &Cli, config: &Config, cwd: &camino::Utf8Path) -> anyhow::Result<()> {
    debug!(
        target = %cli.target,
        no_push = cli.no_push,
        strict = cli.strict,
        "executing release command"
    );

    let options = ReleaseOptions {
        target: cli.target.clone(),
        preid: cli.preid.clone(),
        no_push: cli.no_push,
        strict: cli.strict,
    };

    // Plan the release (state verification + version resolution)
    let ready = release::plan_release(cwd, config, options).context("release planning failed")?;

    // Parser warnings go to stderr so stdout stays clean for scripting
    if !cli.quiet {
        for warning in &ready.warnings {
            eprintln!("{} {warning}", "warning:".yellow().bold());
        }
        if ready.placeholder_injected {
            eprintln!(
                "{} unreleased section has no content; releasing a placeholder entry",
                "warning:".yellow().bold()
            );
        }
        if !git::is_inside_repo().unwrap_or(true) {
            eprintln!(
                "{} not inside a git repository; the commit step will fail",
                "warning:".yellow().bold()
            );
        }
    }

    let plan = ready.plan.clone();

    // Display the plan header
    if !cli.quiet {
        println!(
            "\n{}: {} → {}",
            "Release".bold(),
            plan.current.to_string().dimmed(),
            plan.next.to_string().green().bold(),
        );
        if !plan.next.pre.is_empty() {
            println!("{}: pre-release", "Kind".dimmed());
        }
        print_step_summary(&plan);
    }

    // Confirm before executing (unless --yes)
    if !cli.yes {
        if !std::io::stdin().is_terminal() {
            bail!(
                "confirmation required but stdin is not a terminal; pass --yes to release non-interactively"
            );
        }
        let confirmed = Confirm::new(&format!("Release {}?", plan.next))
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    // Execute with progress display
    let quiet = cli.quiet;
    let outcome = ready
        .execute(cwd, |event| {
            if !quiet {
                handle_event(event);
            }
        })
        .context("release failed")?;

    // Display final summary
    if !quiet {
        println!();
        println!(
            "{} Released {} ({} → {})",
            "✓".green().bold(),
            outcome.tag.green().bold(),
            outcome.previous,
            outcome.version,
        );
        if !outcome.pushed {
            print_no_push_followup(&plan, &outcome);
        }
    }

    Ok(())
}

/// Handle a release event for terminal progress display.
fn handle_event(event: ReleaseEvent) {
    match event {
        ReleaseEvent::StepStarted(step) => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg}")
                    .unwrap()
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
            spinner.set_message(format!("{step}..."));
            // Steps are synchronous; the spinner shows briefly to indicate activity.
            spinner.finish_and_clear();
        }
        ReleaseEvent::StepCompleted(step, outcome) => match outcome {
            StepOutcome::Success { message } => {
                println!(
                    "  {} {} {}",
                    "✓".green(),
                    format!("{step}").bold(),
                    message.dimmed(),
                );
            }
            StepOutcome::Skipped { reason } => {
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    format!("{step}").bold(),
                    format!("skipped: {reason}").dimmed(),
                );
            }
        },
    }
}

/// Print a summary of execution steps before the confirmation prompt.
fn print_step_summary(plan: &ReleasePlan) {
    let steps: &[(&str, bool)] = &[
        ("metadata", true),
        ("changelog", true),
        ("checks", plan.checks.is_some()),
        ("commit", true),
        ("tag", true),
        ("push", !plan.no_push),
    ];

    let active: Vec<&str> = steps
        .iter()
        .filter(|(_, on)| *on)
        .map(|(n, _)| *n)
        .collect();
    let skipped: Vec<&str> = steps
        .iter()
        .filter(|(_, on)| !*on)
        .map(|(n, _)| *n)
        .collect();

    print!("  {}: {}", "Steps".dimmed(), active.join(", ").bold());
    if !skipped.is_empty() {
        print!(" {}", format!("(skip: {})", skipped.join(", ")).dimmed());
    }
    println!();

    if let Some(ref checks) = plan.checks {
        println!("  {}: {}", "Checks".dimmed(), checks);
    }
    if !plan.no_push {
        let destination = match plan.branch {
            Some(ref branch) => format!("{branch} → {}", plan.remote),
            None => plan.remote.clone(),
        };
        println!("  {}: {}", "Push".dimmed(), destination);
    }

    println!();
}

/// Print completion and recovery commands for a release that was not pushed.
fn print_no_push_followup(plan: &ReleasePlan, outcome: &ReleaseOutcome) {
    let branch = plan.branch.as_deref().unwrap_or("HEAD");
    println!();
    println!("{}", "Push was skipped. To complete the release:".bold());
    println!("  git push {} {branch}", plan.remote);
    println!("  git push {} --tags", plan.remote);
    println!();
    println!("{}", "To undo it instead:".dimmed());
    println!("  git tag -d {}", outcome.tag);
    println!("  git reset --hard HEAD~1");
}
