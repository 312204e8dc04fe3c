use adastra_core::version::{version_string, VERSION};
use miette::{IntoDiagnostic, Result};

/// Print the version, as `{"name":"adastra","version":"..."}` with `--json`.
pub fn run(json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({ "name": "adastra", "version": VERSION });
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
