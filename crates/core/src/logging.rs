use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the stderr subscriber for embedders without their own.
///
/// `RUST_LOG` wins over `verbosity` (0 errors, 1 info, 2+ debug). A second
/// call, or a call after the host installed a subscriber, does nothing.
pub fn init_logging(verbosity: u8) {
	let default_level = match verbosity {
		0 => "error",
		1 => "info",
		_ => "debug",
	};
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	let _ = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init();
}
