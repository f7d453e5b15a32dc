use std::fmt::Display;

use tracing::warn;

pub fn log_if_error<T, E: Display>(msg: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(o) => Some(o),
        Err(e) => {
            warn!("{}: {}", msg, e);
            None
        }
    }
}
