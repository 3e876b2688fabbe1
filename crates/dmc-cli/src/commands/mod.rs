pub mod config;
pub mod create;
pub mod stop;

use serde::Serialize;

use crate::common::to_json;
use crate::errors::{ErrorReport, ProvisionError};

/// Print the response, or the error report, as JSON on stdout
///
/// Returns the process exit code.
pub fn emit<T: Serialize>(result: &Result<T, ProvisionError>) -> i32 {
    match result {
        Ok(response) => {
            println!("{}", to_json(response));
            0
        }
        Err(e) => {
            dmc_logger::error(&e.to_string());
            println!("{}", to_json(&ErrorReport::from(e)));
            1
        }
    }
}
