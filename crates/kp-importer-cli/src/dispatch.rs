use kp_importer_client::commands;
use kp_importer_client::commands::import::ImportOptions;
use kp_importer_client::{ClientResult, SuccessEnvelope};

use crate::cli::{Cli, Commands};

pub fn dispatch(cli: &Cli) -> ClientResult<SuccessEnvelope> {
    if let Commands::Init { db } = &cli.command {
        return commands::init::run(db.as_deref());
    }
    match cli.command.import() {
        Some((kind, args)) => commands::import::run_with_options(ImportOptions {
            kind,
            file: args.file.clone(),
            db_path: args.db.clone(),
            admin_id: args.admin_id,
            batch_size: args.batch,
            sheet: args.sheet.clone(),
            log_id: args.log_id.clone(),
        }),
        None => Err(kp_importer_client::ClientError::invalid_argument(
            "unsupported command",
        )),
    }
}
