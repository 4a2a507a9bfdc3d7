use crate::commands::check;
use crate::commands::{CmdMessage, CmdResult, ExportedDocument};
use crate::compose::{Compositor, DocumentOutcome, ExportOptions};
use crate::convert::Toolchain;
use crate::error::Result;
use crate::model::Entity;
use crate::pdf::PdfBackend;
use crate::store::DataStore;
use tracing::{error, info};

/// Exports every document of the store.
///
/// The store is checked first; nothing is written unless the check allows it.
/// `progress` is called before each document with its index and the total.
pub fn run<S, F>(
    store: &S,
    toolchain: &Toolchain,
    backend: &dyn PdfBackend,
    options: &ExportOptions,
    ignore_assertions: bool,
    mut progress: F,
) -> Result<CmdResult>
where
    S: DataStore,
    F: FnMut(usize, usize, &Entity),
{
    let (scan, report) = check::inspect(store)?;
    let mut result = CmdResult::default();

    if !report.allows_export(ignore_assertions) {
        check::summarize(&report, &mut result);
        let reason = if report.compatibility_count() > 0 {
            "the store uses formats that are not supported"
        } else {
            "the store is inconsistent (use --ignore-assertions to export anyway)"
        };
        result.add_message(CmdMessage::error(format!("Export aborted: {}.", reason)));
        result.blocked = true;
        return Ok(result.with_report(report));
    }
    if report.assertion_count() > 0 {
        result.add_message(CmdMessage::warning(format!(
            "Ignoring {} assertion error(s).",
            report.assertion_count()
        )));
    }

    let compositor = Compositor::new(store, toolchain, backend, options);
    let documents: Vec<&Entity> = scan.documents().collect();
    let total = documents.len();
    let mut failures = 0;

    for (index, entity) in documents.into_iter().enumerate() {
        progress(index, total, entity);

        match compositor.export(entity, &scan.entities) {
            Ok(outcome) => {
                match &outcome {
                    DocumentOutcome::Written { failed, .. } if *failed > 0 => {
                        result.add_message(CmdMessage::warning(format!(
                            "{}: {} page(s) could not be rendered and were skipped.",
                            entity, failed
                        )));
                    }
                    DocumentOutcome::Empty(path) => {
                        result.add_message(CmdMessage::warning(format!(
                            "{}: nothing to export, {} was not written.",
                            entity,
                            path.display()
                        )));
                    }
                    _ => {}
                }
                result.exported.push(ExportedDocument {
                    entity: entity.clone(),
                    outcome,
                });
            }
            Err(e) => {
                error!("Failed to export {}: {}", entity, e);
                result.add_message(CmdMessage::error(format!("{}: {}", entity, e)));
                failures += 1;
            }
        }
    }

    let written = result
        .exported
        .iter()
        .filter(|d| !matches!(d.outcome, DocumentOutcome::Empty(_)))
        .count();
    info!("exported {} of {} document(s)", written, total);
    result.add_message(CmdMessage::success(format!(
        "Exported {} of {} document(s) to {}.",
        written,
        total,
        options.dst.display()
    )));
    if failures > 0 {
        result.add_message(CmdMessage::error(format!(
            "{} document(s) failed.",
            failures
        )));
    }

    Ok(result.with_report(report))
}
