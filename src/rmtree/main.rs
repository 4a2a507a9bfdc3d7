use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rmtree::api::{
    CheckReport, CmdMessage, CmdResult, ExportedDocument, FindingKind, ListedEntity, MessageLevel,
    RmTreeApi,
};
use rmtree::commands::stats;
use rmtree::compose::{DocumentOutcome, ExportOptions};
use rmtree::config::RmTreeConfig;
use rmtree::error::{RmTreeError, Result};
use rmtree::model::EntityKind;
use rmtree::store::fs::FileStore;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unicode_width::UnicodeWidthStr;

mod args;
use args::{Cli, Commands};

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the command ran but did not succeed.
fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = RmTreeConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Export {
            src,
            dst,
            ignore_assertions,
            keep_svg,
            templates,
        } => {
            let options = ExportOptions {
                dst,
                templates_dir: templates.or_else(|| config.templates_dir.clone()),
                keep_svg: keep_svg || config.keep_svg,
            };
            handle_export(
                &config,
                &src,
                &options,
                ignore_assertions || config.ignore_assertions,
            )
        }
        Commands::Check { src } => handle_check(&config, &src),
        Commands::Tree { src } => handle_tree(&config, &src),
        Commands::Stats { src } => handle_stats(&config, &src),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn open_api(config: &RmTreeConfig, src: &Path) -> Result<RmTreeApi<FileStore>> {
    if !src.is_dir() {
        return Err(RmTreeError::NotFound(src.display().to_string()));
    }
    let store = FileStore::new(src);
    if tracing::enabled!(tracing::Level::DEBUG) {
        debug!("entries per extension: {:?}", stats::count_extensions(&store)?);
    }
    Ok(RmTreeApi::new(store, config.toolchain()))
}

fn handle_export(
    config: &RmTreeConfig,
    src: &Path,
    options: &ExportOptions,
    ignore_assertions: bool,
) -> Result<bool> {
    let api = open_api(config, src)?;
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let result = api.export(options, ignore_assertions, |index, total, entity| {
        if index == 0 {
            bar.set_length(total as u64);
        }
        bar.set_position(index as u64);
        bar.set_message(entity.to_string());
    })?;
    bar.finish_and_clear();

    match &result.report {
        Some(report) if result.blocked => print_report(report),
        _ => print_exported(&result.exported),
    }
    print_messages(&result.messages);
    Ok(!result.blocked && !has_errors(&result))
}

fn handle_check(config: &RmTreeConfig, src: &Path) -> Result<bool> {
    let api = open_api(config, src)?;
    let result = api.check()?;
    if let Some(report) = &result.report {
        print_report(report);
    }
    print_messages(&result.messages);
    Ok(result.report.as_ref().map_or(true, CheckReport::is_clean))
}

fn handle_tree(config: &RmTreeConfig, src: &Path) -> Result<bool> {
    let api = open_api(config, src)?;
    let result = api.tree()?;
    print_listed(&result.listed);
    print_messages(&result.messages);
    Ok(true)
}

fn handle_stats(config: &RmTreeConfig, src: &Path) -> Result<bool> {
    let api = open_api(config, src)?;
    let result = api.stats()?;
    print_counts(&result.extension_counts);
    print_messages(&result.messages);
    Ok(true)
}

fn has_errors(result: &CmdResult) -> bool {
    result
        .messages
        .iter()
        .any(|m| matches!(m.level, MessageLevel::Error))
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
            MessageLevel::Error => println!("{}", message.content.red()),
        }
    }
}

const NAME_WIDTH: usize = 40;

fn pad(text: &str, width: usize) -> String {
    let used = text.width();
    if used >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - used))
    }
}

fn print_report(report: &CheckReport) {
    for (kind, title) in [
        (FindingKind::Compatibility, "Compatibility errors"),
        (FindingKind::Assertion, "Assertion errors"),
    ] {
        let findings: Vec<_> = report.of_kind(kind).collect();
        if findings.is_empty() {
            continue;
        }
        println!("{} ({})", title.bold(), findings.len());
        for finding in findings {
            let line = format!("  {} {}", pad(&finding.name, NAME_WIDTH), finding.message);
            match kind {
                FindingKind::Compatibility => println!("{}", line.red()),
                FindingKind::Assertion => println!("{}", line.yellow()),
            }
            for (ordinal, page) in &finding.pages {
                println!("      {} {}", format!("page {:>3}", ordinal).dimmed(), page);
            }
        }
    }
}

fn print_exported(exported: &[ExportedDocument]) {
    for doc in exported {
        let (tag, path) = match &doc.outcome {
            DocumentOutcome::Copied(path) => ("copied ".cyan(), path),
            DocumentOutcome::Written { path, .. } => ("written".green(), path),
            DocumentOutcome::Empty(path) => ("empty  ".red(), path),
        };
        println!(
            "{} {} {}",
            tag,
            pad(&doc.entity.name, NAME_WIDTH),
            path.display().to_string().dimmed()
        );
    }
}

fn print_listed(listed: &[ListedEntity]) {
    for item in listed {
        let path = match (&item.path, item.kind()) {
            (Some(path), EntityKind::Document) => format!("{}.pdf", path.display()),
            (Some(path), EntityKind::Folder) => format!("{}/", path.display()),
            (None, _) => "?".to_string(),
        };
        let line = format!(
            "{} {}",
            pad(&path, NAME_WIDTH),
            item.entity.id.to_string().dimmed()
        );
        match item.kind() {
            EntityKind::Folder => println!("{}", line.blue()),
            EntityKind::Document => println!("{}", line),
        }
    }
}

fn print_counts(counts: &BTreeMap<String, usize>) {
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (label, count) in sorted {
        println!("{} {}", pad(label, 16), count.to_string().bold());
    }
}
