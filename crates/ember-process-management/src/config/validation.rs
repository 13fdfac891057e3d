use super::*;

/// Validate a configuration
pub fn validate_configuration(config: &Configuration) -> ProcessResult<()> {
    validate_log_directory(&config.log_directory)
}

fn validate_log_directory(dir: &Path) -> ProcessResult<()> {
    if dir.as_os_str().is_empty() {
        return Err(ProcessError::configuration("logDirectory cannot be empty"));
    }

    if dir.exists() && !dir.is_dir() {
        return Err(ProcessError::configuration(format!(
            "logDirectory {} exists and is not a directory",
            dir.display()
        )));
    }

    Ok(())
}
