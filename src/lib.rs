pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod due;
pub mod events;
pub mod forms;
pub mod logging;
pub mod models;
pub mod screens;
pub mod storage;
pub mod task_list;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{ApiError, AuthApi, TaskApi};
#[cfg(feature = "app")]
pub use api::HttpClient;
pub use app::App;
pub use config::ClientConfig;
pub use models::{Session, Task};
pub use task_list::TaskList;

/// Boots the client against the configured API, with file logging when it can be set up.
#[cfg(all(feature = "app", not(test)))]
pub fn start(config: ClientConfig) -> Result<App<HttpClient>, ApiError> {
    if let Err(error) = logging::init_logging(config.data_dir()) {
        eprintln!("failed to initialize logging: {error}");
    }
    let client = HttpClient::new(config.clone())?;
    Ok(App::boot(client, &config))
}
