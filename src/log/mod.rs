use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Log bootstrap. The filter sits behind a reload handle so the level from a
/// config file can be applied after the subscriber is installed.
pub struct Logger {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl Logger {
    pub fn init(initial: &str) -> Self {
        let (filter_layer, filter) = reload::Layer::new(EnvFilter::new(initial));

        Registry::default()
            .with(filter_layer)
            .with(fmt::layer())
            .init();

        Logger { filter }
    }

    pub fn set_log_level(&self, level: &str) {
        if self.filter.modify(|f| *f = EnvFilter::new(level)).is_err() {
            warn!("Log filter reload failed, keeping the current level");
        }
    }
}
