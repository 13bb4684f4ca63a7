use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "REMINDER_BOT_LOG";

pub fn init_tracing(component: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(component))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .try_init();
}

fn resolve_filter(component: &str) -> EnvFilter {
    std::env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directives(component)))
}

fn default_directives(component: &str) -> String {
    format!("info,reminder_bot=debug,{component}=debug")
}
