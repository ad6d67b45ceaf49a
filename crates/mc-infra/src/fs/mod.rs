mod app_dirs;

pub use app_dirs::{app_config_dir, app_log_dir};
