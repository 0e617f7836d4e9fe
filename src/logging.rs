use std::path::{Path, PathBuf};

pub const LOG_FILE_BASENAME: &str = "todo-client";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const LOG_ENV_VAR: &str = "TODO_CLIENT_LOG";

/// Log files sit in a `logs/` folder next to the stored session.
pub fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

fn default_spec() -> &'static str {
    if cfg!(debug_assertions) {
        "warn,todo_client_lib=debug"
    } else {
        "warn,todo_client_lib=info"
    }
}

/// Picks the filter spec: `TODO_CLIENT_LOG`, then `RUST_LOG`, then the build default.
pub fn resolve_spec(own: Option<String>, rust_log: Option<String>) -> String {
    own.filter(|value| !value.trim().is_empty())
        .or_else(|| rust_log.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| default_spec().to_string())
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(data_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    let directory = log_directory(data_dir);
    std::fs::create_dir_all(&directory)?;

    let spec = resolve_spec(
        std::env::var(LOG_ENV_VAR).ok(),
        std::env::var("RUST_LOG").ok(),
    );

    Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(&directory)
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::None
        })
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        directory.display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");
        let location = info
            .location()
            .map(|loc| format!("{loc}"))
            .unwrap_or_else(|| "<unknown>".to_string());
        let backtrace = std::backtrace::Backtrace::force_capture();

        log::error!("panic: payload={payload} location={location}\nbacktrace:\n{backtrace}");
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_live_under_data_dir() {
        assert_eq!(
            log_directory(Path::new("/data/app")),
            Path::new("/data/app/logs")
        );
    }

    #[test]
    fn own_variable_wins_over_rust_log() {
        let spec = resolve_spec(Some("trace".to_string()), Some("error".to_string()));
        assert_eq!(spec, "trace");
    }

    #[test]
    fn blank_values_fall_through() {
        assert_eq!(
            resolve_spec(Some("  ".to_string()), Some("error".to_string())),
            "error"
        );
        assert_eq!(resolve_spec(None, Some(String::new())), default_spec());
        assert!(resolve_spec(None, None).contains("todo_client_lib="));
    }
}
