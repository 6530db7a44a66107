use env_logger::{Builder, Env};

// HTTP internals are only interesting when asked for explicitly
const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { DEFAULT_FILTER };
    let initialized = Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .format_module_path(false)
        .format_target(false)
        .try_init();
    if initialized.is_err() {
        log::debug!("Logger already initialized");
    }
}
