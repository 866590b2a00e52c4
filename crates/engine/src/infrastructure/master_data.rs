//! Master-data loading.
//!
//! Master data is read once at startup and installed into a process-wide cell.
//! Use cases receive an `Arc<MasterData>` at construction; `global()` is for
//! code that runs outside the composition root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use wyrmhold_domain::{DomainError, MasterData, MasterDataFile};

static MASTER_DATA: OnceCell<Arc<MasterData>> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum MasterDataError {
    #[error("Failed to read master data from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse master data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid master data: {0}")]
    Invalid(#[from] DomainError),
    #[error("Master data is already installed")]
    AlreadyInstalled,
}

/// Parse and validate master data from JSON text.
pub fn parse(json: &str) -> Result<MasterData, MasterDataError> {
    let file: MasterDataFile = serde_json::from_str(json)?;
    Ok(MasterData::from_file(file)?)
}

/// Read master data from `path`, or the built-in defaults when no path is configured.
pub fn load(path: Option<&Path>) -> Result<MasterData, MasterDataError> {
    let Some(path) = path else {
        tracing::warn!("MASTER_DATA_PATH not set, starting with empty master data");
        return Ok(MasterData::default());
    };

    let json = std::fs::read_to_string(path).map_err(|source| MasterDataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse(&json)?;
    tracing::info!(
        path = %path.display(),
        missions = data.missions().count(),
        "Master data loaded"
    );
    Ok(data)
}

/// Install master data for the lifetime of the process. Only the first call succeeds.
pub fn install(data: MasterData) -> Result<Arc<MasterData>, MasterDataError> {
    let data = Arc::new(data);
    MASTER_DATA
        .set(Arc::clone(&data))
        .map_err(|_| MasterDataError::AlreadyInstalled)?;
    Ok(data)
}

/// Master data installed by [`install`], if any.
pub fn global() -> Option<Arc<MasterData>> {
    MASTER_DATA.get().cloned()
}
