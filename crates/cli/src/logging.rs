use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level for the session crates at a given verbosity.
///
/// Progress already goes to stdout, so the default only surfaces warnings and
/// errors; each `-v` lowers the threshold one step.
pub const fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter directives for a given verbosity.
///
/// The binary's own target (`docdb`, set by the `[[bin]]` name) carries the
/// fatal diagnostic, so it is enabled next to the library targets. At `-vvv`
/// the `mongodb` driver's own events are included as well.
pub fn directives(verbose: u8) -> String {
    let level = level_for(verbose);
    let mut directives = format!("{}={},docdb_session={}", env!("CARGO_CRATE_NAME"), level, level);
    if verbose >= 3 {
        directives.push_str(",mongodb=debug");
    }
    directives
}

/// Initialize tracing with the specified verbosity level and output format.
///
/// Logs are written to stderr so they never interleave with the progress lines
/// on stdout.
///
/// # Arguments
/// * `json` - If true, output logs in JSON format; otherwise, use human-readable format.
/// * `verbose` - Verbosity level: 0 for WARN, 1 for INFO, 2 for DEBUG, 3+ for TRACE.
pub fn init_tracing(json: bool, verbose: u8) {
    let registry = tracing_subscriber::registry().with(EnvFilter::new(directives(verbose)));

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(3), "trace");
        assert_eq!(level_for(9), "trace");
    }

    /// Test that events logged by this binary pass the filter at every verbosity.
    #[test]
    fn test_directives_enable_binary_target() {
        let binary_target = module_path!()
            .split("::")
            .next()
            .unwrap();
        for verbose in 0..=3 {
            let directives = directives(verbose);
            let expected = format!("{}={}", binary_target, level_for(verbose));
            assert!(
                directives.split(',').any(|directive| directive == expected),
                "{} missing from {}",
                expected,
                directives
            );
        }
    }

    #[test]
    fn test_directives_include_driver_only_at_trace() {
        assert!(!directives(2).contains("mongodb"));
        assert!(directives(3).ends_with(",mongodb=debug"));
    }
}
