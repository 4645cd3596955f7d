//! Sync command handlers and report rendering

use anyhow::Result;
use colored::*;
use std::time::Instant;

use super::{StreamArg, SyncArgs};
use crate::cli::context::AppContext;
use mfr_sync::sync::{PassReport, RunFailure, StreamKind, SyncReport, SyncRunner};

/// Issues listed per pass before the rest is summarized
const MAX_LISTED_ISSUES: usize = 20;

pub async fn handle_sync_command(ctx: &AppContext, args: SyncArgs) -> Result<()> {
    ctx.config.validate()?;
    let registry = ctx.registry()?;
    let destination = ctx.destination()?;
    let runner = SyncRunner::new(&registry, &destination, &ctx.cursors, ctx.run_settings()?);

    println!("Syncing {} from {}", describe(args.stream).bright_cyan(), ctx.config.registry.base_url.dimmed());
    let start = Instant::now();
    let outcome = match args.stream {
        StreamArg::Added => runner.run(StreamKind::Added).await,
        StreamArg::Updated => runner.run(StreamKind::Updated).await,
        StreamArg::All => runner.run_all().await,
    };
    finish(outcome, start)
}

pub async fn handle_reconcile_command(ctx: &AppContext) -> Result<()> {
    ctx.config.validate()?;
    let registry = ctx.registry()?;
    let destination = ctx.destination()?;
    let runner = SyncRunner::new(&registry, &destination, &ctx.cursors, ctx.run_settings()?);

    println!("Reconciling hierarchy into {}", ctx.config.destination.base_url.dimmed());
    let start = Instant::now();
    finish(runner.reconcile_only().await, start)
}

pub async fn handle_site_command(ctx: &AppContext, site_id: &str) -> Result<()> {
    ctx.config.validate()?;
    let registry = ctx.registry()?;
    let destination = ctx.destination()?;
    let runner = SyncRunner::new(&registry, &destination, &ctx.cursors, ctx.run_settings()?);

    println!("Syncing site {}", site_id.bright_cyan());
    let start = Instant::now();
    finish(runner.sync_site(site_id).await, start)
}

fn describe(stream: StreamArg) -> &'static str {
    match stream {
        StreamArg::Added => "added facilities",
        StreamArg::Updated => "updated facilities",
        StreamArg::All => "added and updated facilities",
    }
}

fn finish(outcome: Result<SyncReport, RunFailure>, start: Instant) -> Result<()> {
    match outcome {
        Ok(report) => {
            print_report(&report);
            println!(
                "{} in {:.1}s",
                "Completed".bright_green().bold(),
                start.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(failure) => {
            print_report(&failure.report);
            println!(
                "{} {} in {:.1}s",
                "Failed:".bright_red().bold(),
                failure.error.kind().red(),
                start.elapsed().as_secs_f64()
            );
            Err(failure.into())
        }
    }
}

fn print_report(report: &SyncReport) {
    println!();
    println!(
        "Run {} {}",
        report.run_id.to_string().dimmed(),
        report.collection.as_deref().unwrap_or("<no collection>").bold()
    );

    for step in &report.orchestrations {
        println!(
            "  {} {:<20} {}",
            step.timestamp.format("%H:%M:%S").to_string().dimmed(),
            step.name,
            step.detail
        );
    }

    if let Some(reconcile) = &report.reconcile {
        println!();
        println!("{}", "Hierarchy".bold());
        println!(
            "  {} visited, {} existing, {} created",
            reconcile.visited,
            reconcile.existing,
            reconcile.created.len().to_string().green()
        );
        for gap in &reconcile.gaps {
            println!("  {} {}", "gap".yellow(), gap);
        }
        for failure in &reconcile.failures {
            println!("  {} {}: {}", "failed".red(), failure.code, failure.error);
        }
    }

    for pass in &report.passes {
        print_pass(pass);
    }
    println!();
}

fn print_pass(pass: &PassReport) {
    println!();
    println!("{} pass since {}", pass.stream.label().bold(), pass.since);
    println!(
        "  {} pages, {} records, {} submitted, {} imported",
        pass.pages,
        pass.records,
        pass.submitted,
        pass.imported.to_string().green()
    );
    if !pass.ancestors_created.is_empty() {
        println!("  ancestors created: {}", pass.ancestors_created.join(", "));
    }
    if !pass.phcu_parents_created.is_empty() {
        println!("  PHCUs registered: {}", pass.phcu_parents_created.join(", "));
    }
    for rejection in &pass.rejections {
        println!(
            "  {} {}: {}",
            "rejected".red(),
            rejection.code.as_deref().unwrap_or("<unknown>"),
            rejection.reason
        );
    }
    for issue in pass.issues.iter().take(MAX_LISTED_ISSUES) {
        println!("  {} {}", issue.kind().yellow(), issue);
    }
    if pass.issues.len() > MAX_LISTED_ISSUES {
        println!("  ... and {} more issues", pass.issues.len() - MAX_LISTED_ISSUES);
    }
    match &pass.cursor_advanced_to {
        Some(cursor) => println!("  cursor advanced to {}", cursor.green()),
        None => println!("  cursor {}", "unchanged".yellow()),
    }
}
