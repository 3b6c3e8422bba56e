mod json;

use std::io;

use kp_importer_client::{ClientError, SuccessEnvelope};

use crate::stdout_io::write_stdout_line;

pub fn print_success(success: &SuccessEnvelope) -> io::Result<()> {
    write_stdout_line(&json::render_success_json(success)?)
}

pub fn print_failure(error: &ClientError) -> io::Result<()> {
    write_stdout_line(&json::render_error_json(error)?)
}
