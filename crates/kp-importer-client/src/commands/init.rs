use std::path::Path;

use crate::ClientResult;
use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::InitData;
use crate::setup::ensure_initialized_at;
use crate::state::resolve_db_path;

/// Creates or migrates the schema at `--db` (or `KP_IMPORTER_DB`).
pub fn run(db_path: Option<&Path>) -> ClientResult<SuccessEnvelope> {
    let db_path = resolve_db_path(db_path)?;
    let setup = ensure_initialized_at(&db_path)?;
    let data = InitData {
        message: format!("Database ready at schema version {}", setup.schema_version),
        db_path: setup.db_path,
        schema_version: setup.schema_version,
    };
    success("init", data)
}
