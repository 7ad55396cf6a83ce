use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub(crate) fn parse_level(value: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(value).map_err(|_| format!("unknown log level {value:?}"))
}

/// Applies `level` to the editor's own targets and WARN to everything else.
/// Output goes to stderr so `--print` keeps stdout clean.
pub(crate) fn setup_tracing(level: LevelFilter) {
    let level = level.into_level();
    let filter_layer = tracing_subscriber::filter::filter_fn(move |metadata| {
        let is_gizmo = metadata.target().starts_with("gizmo");
        let effective_level = if is_gizmo { level } else { Some(Level::WARN) };
        effective_level.is_some_and(|effective| metadata.level() <= &effective)
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_layer))
        .init();
}
