pub mod compile;
pub mod edit;
pub mod new;
pub mod preview;
pub mod run;
pub mod types;

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use gmxflow::compiler::Selection;
use gmxflow::core::models::ids::NodeId;
use gmxflow::core::registry::PortTypeRegistry;
use gmxflow::workflows::{Pipeline, SessionIndex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// The built-in catalogue, extended with the configured one if any.
pub fn load_registry(config: &AppConfig) -> Result<Arc<PortTypeRegistry>> {
    let mut registry = PortTypeRegistry::builtin()?;
    if let Some(path) = &config.catalogue {
        info!("Loading extra node catalogue from {:?}", path);
        registry.extend(PortTypeRegistry::load(path)?)?;
    }
    Ok(Arc::new(registry))
}

/// Opens a session with the configured ordering, logging restore problems.
pub fn open_session(config: &AppConfig, path: &Path) -> Result<(Pipeline, SessionIndex)> {
    let registry = load_registry(config)?;
    let (pipeline, index) = Pipeline::open(registry, path)?;
    for issue in &index.issues {
        warn!("{}: {}", path.display(), issue);
    }
    Ok((pipeline.with_ordering(config.ordering), index))
}

/// Refuses to rewrite a session that lost entries on load unless `force` is set.
pub fn ensure_lossless(index: &SessionIndex, path: &Path, force: bool) -> Result<()> {
    if index.issues.is_empty() {
        return Ok(());
    }
    if force {
        warn!(
            "Saving {} without {} unrestored part(s)",
            path.display(),
            index.issues.len()
        );
        return Ok(());
    }
    Err(CliError::Argument(format!(
        "{} could not be fully restored ({} issue(s)); saving would drop those parts. Use --force to save anyway.",
        path.display(),
        index.issues.len()
    )))
}

pub fn resolve_node(index: &SessionIndex, document_id: &str) -> Result<NodeId> {
    index.get(document_id).ok_or_else(|| {
        CliError::Argument(format!(
            "No node '{}' in the session. Known ids: {}",
            document_id,
            index.ids.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    })
}

pub fn selection(index: &SessionIndex, document_ids: &[String]) -> Result<Selection> {
    if document_ids.is_empty() {
        return Ok(Selection::All);
    }
    document_ids
        .iter()
        .map(|id| resolve_node(index, id))
        .collect::<Result<Vec<_>>>()
        .map(Selection::Nodes)
}

/// Directory a session's relative file names refer to.
pub fn session_dir(session: &Path) -> PathBuf {
    match session.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::load_registry;
    use crate::cli::ConfigArgs;
    use crate::config::{AppConfig, CliOverrides, build_config};
    use gmxflow::core::models::node::Position;
    use gmxflow::core::models::port::PortRef;
    use gmxflow::workflows::Pipeline;
    use std::path::{Path, PathBuf};

    pub fn default_config() -> AppConfig {
        build_config(&ConfigArgs::default(), None, &CliOverrides::default()).unwrap()
    }

    /// Saves `pdb2gmx -> editconf` (gro) as `session.json` in `dir`.
    pub fn write_prep_session(dir: &Path) -> PathBuf {
        let path = dir.join("session.json");
        let mut pipeline = Pipeline::new(load_registry(&default_config()).unwrap());
        let prep = pipeline.add_node("pdb2gmx", Position::new(0.0, 0.0)).unwrap();
        let boxed = pipeline.add_node("editconf", Position::new(200.0, 0.0)).unwrap();
        pipeline
            .connect(PortRef::new(prep, "out_gro"), PortRef::new(boxed, "in_gro"))
            .unwrap();
        pipeline.save(&path).unwrap();
        path
    }
}
