use crate::commands::{CmdMessage, CmdResult, ListedEntity};
use crate::error::Result;
use crate::store::DataStore;
use crate::tree;

/// Lists every entity with the path it exports to, sorted by path.
pub fn run<S: DataStore>(store: &S) -> Result<CmdResult> {
    let scan = tree::scan(store)?;
    let mut result = CmdResult::default();

    let mut listed: Vec<ListedEntity> = scan
        .entities
        .values()
        .map(|entity| {
            let path = match tree::output_path(entity, &scan.entities) {
                Ok(path) => Some(path),
                Err(e) => {
                    result.add_message(CmdMessage::warning(format!("{}: {}", entity, e)));
                    None
                }
            };
            ListedEntity {
                entity: entity.clone(),
                path,
            }
        })
        .collect();
    listed.sort_by(|a, b| a.path.cmp(&b.path).then(a.entity.id.cmp(&b.entity.id)));

    if !scan.issues.is_empty() {
        result.add_message(CmdMessage::info(format!(
            "{} store entries could not be loaded, run `rmtree check` for details.",
            scan.issues.len()
        )));
    }

    Ok(result.with_listed(listed))
}
