mod convert;
mod inspect;
mod verify;

use std::path::Path;

pub use convert::handle_convert;
pub use inspect::handle_inspect;
use paramdir::ParameterArchive;
pub use verify::handle_verify;

fn open(path: &str) -> Result<ParameterArchive, String> {
    if !Path::new(path).exists() {
        return Err(format!("parameter file not found: {path}"));
    }
    let mut archive = ParameterArchive::new();
    archive
        .add(path)
        .map_err(|error| format!("failed to load {path}: {error}"))?;
    Ok(archive)
}
