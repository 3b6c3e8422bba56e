mod cli;
mod dispatch;
mod logging;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use kp_importer_client::ClientError;
use stdout_io::write_stdout_text;

const ROOT_HELP: &str = "kp-importer - spreadsheet importer for the back-office database

Usage:
  kp-importer <command> [--file <path>] [--db <path>] [--admin-id <id>] [--batch <n>] [--sheet <name>] [--log-id <id>]

Prepare the database:
  kp-importer init --db <path>                    Create or migrate the schema

Master data:
  outlet, product, stock

Sales:
  invoice, invoice-outstanding, invoice-product, invoice-outstanding-product,
  invoice-product-missing, invoice-fee, invoice-return, invoice-return-product

Finance:
  deposit, giro, settlement, transfer, balance

Logistics:
  intransit, intransit-product, dmf

Every command prints one JSON object: {\"success\", \"message\", \"message_detail\"}.
Diagnostics go to stderr; set RUST_LOG to change verbosity.
Run `kp-importer <command> --help` for command usage.
";

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 || is_top_level_help_request(&raw_args) {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }
    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => {
            if matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                if write_stdout_text(&err.to_string()).is_err() {
                    return Err(ExitCode::from(2));
                }
                return Ok(ExitCode::SUCCESS);
            }
            let command_hint = if matches!(
                err.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::InvalidValue
                    | ErrorKind::ValueValidation
                    | ErrorKind::WrongNumberOfValues
                    | ErrorKind::UnknownArgument
            ) {
                command_from_args(&raw_args)
            } else {
                None
            };
            let clean_message = strip_clap_boilerplate(&err.to_string());
            let parse_error =
                ClientError::invalid_argument_for_command(&clean_message, command_hint.as_deref());
            if output::print_failure(&parse_error).is_err() {
                return Err(ExitCode::from(2));
            }
            return Err(ExitCode::from(1));
        }
    };

    logging::init_logging();
    match dispatch::dispatch(&cli) {
        Ok(success) => {
            if output::print_success(&success).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            tracing::error!(code = %error.code, "{}", error.message);
            if output::print_failure(&error).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Strips clap's trailing Usage line and "For more information" hint.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_start_matches("error: ").trim_end().to_string()
}

/// The subcommand named on the command line, for `--help` hints.
fn command_from_args(raw_args: &[String]) -> Option<String> {
    raw_args
        .iter()
        .skip(1)
        .find(|value| !value.starts_with('-'))
        .cloned()
}

fn exit_code_for_error(error: &ClientError) -> ExitCode {
    if is_internal_error(error) {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn is_internal_error(error: &ClientError) -> bool {
    error.code.starts_with("internal_")
}

#[cfg(test)]
mod tests {
    use kp_importer_client::ClientError;

    use super::{command_from_args, is_internal_error, strip_clap_boilerplate};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn clap_boilerplate_is_removed() {
        let message = "error: invalid value '0' for '--batch <BATCH>': batch size must be at least 1\n\nFor more information, try '--help'.\n";
        assert_eq!(
            strip_clap_boilerplate(message),
            "invalid value '0' for '--batch <BATCH>': batch size must be at least 1"
        );
        let with_usage = "error: unexpected argument '--nope' found\n\nUsage: kp-importer giro [OPTIONS]\n";
        assert_eq!(
            strip_clap_boilerplate(with_usage),
            "unexpected argument '--nope' found"
        );
    }

    #[test]
    fn command_hint_skips_flags() {
        assert_eq!(
            command_from_args(&args(&["kp-importer", "--batch", "stock"])),
            Some("stock".to_string())
        );
        assert_eq!(command_from_args(&args(&["kp-importer", "--version"])), None);
    }

    #[test]
    fn only_internal_codes_are_internal() {
        assert!(is_internal_error(&ClientError::internal_serialization("boom")));
        assert!(!is_internal_error(&ClientError::invalid_argument("bad flag")));
        assert!(!is_internal_error(&ClientError::sheet_not_found("Outlet")));
    }
}
