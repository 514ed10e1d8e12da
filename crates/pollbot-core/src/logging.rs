use crate::Result;

/// Initialize logging/tracing for the bot.
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,pollbot=info,pollbot_core=info,pollbot_telegram=info,{service_name}=info"
        ))
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}
