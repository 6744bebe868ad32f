//! Shared utilities: the crate error type and logging setup.

pub mod error;
pub mod logging;

pub use error::ChannelError;

#[cfg(test)]
mod tests {
    use super::{ChannelError, logging};
    use tracing::Level;

    #[test]
    fn logging_init_accepts_levels() {
        // Should not panic
        logging::init("info");
        logging::init("debug");
        logging::init("nonsense");
    }

    #[test]
    fn parse_level_names() {
        assert_eq!(logging::parse_level("error"), Level::ERROR);
        assert_eq!(logging::parse_level("WARN"), Level::WARN);
        assert_eq!(logging::parse_level("warning"), Level::WARN);
        assert_eq!(logging::parse_level(" debug "), Level::DEBUG);
        assert_eq!(logging::parse_level("trace"), Level::TRACE);
        assert_eq!(logging::parse_level("nonsense"), Level::INFO);
    }

    #[test]
    fn errors_convert_from_sources() {
        let err: ChannelError = config::ConfigError::NotFound("server.url".to_string()).into();
        assert!(matches!(err, ChannelError::Config(_)));

        let err: ChannelError = std::io::Error::other("no signal handler").into();
        assert!(matches!(err, ChannelError::Io(_)));
        assert_eq!(err.to_string(), "io error: no signal handler");
    }
}
