use clap::Parser;
use interop_core::InteropError;
use interop_tonic::ServerConfig;

#[derive(Parser, Debug)]
#[command(name = "interop-server")]
#[command(about = "gRPC interop test server (grpc.testing.TestService)")]
pub struct Args {
    /// Port to listen on
    #[arg(long)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Log level for the interop crates (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Pretty, per-call logging with source locations
    #[arg(long, short)]
    pub verbose: bool,

    /// Maximum concurrent requests per connection
    #[arg(long)]
    pub concurrency_limit: Option<usize>,
}

impl Args {
    pub fn server_config(&self) -> Result<ServerConfig, InteropError> {
        let config = ServerConfig::from_host_port(&self.host, self.port)?;
        Ok(match self.concurrency_limit {
            Some(limit) => config.concurrency_limit_per_connection(limit),
            None => config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn port_is_required() {
        let err = Args::try_parse_from(["interop-server"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn defaults_bind_all_interfaces() {
        let args = Args::try_parse_from(["interop-server", "--port", "10000"]).unwrap();
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.log_level, "info");
        assert!(!args.verbose);

        let config = args.server_config().unwrap();
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:10000");
        assert_eq!(config.concurrency_limit(), None);
    }

    #[test]
    fn flags_flow_into_the_config() {
        let args = Args::try_parse_from([
            "interop-server",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--concurrency-limit",
            "16",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);

        let config = args.server_config().unwrap();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.concurrency_limit(), Some(16));
    }

    #[test]
    fn bad_host_is_a_configuration_error() {
        let args = Args::try_parse_from(["interop-server", "--port", "1", "--host", "nope"]).unwrap();
        assert!(matches!(
            args.server_config(),
            Err(InteropError::Configuration(_))
        ));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        assert!(Args::try_parse_from(["interop-server", "--port", "70000"]).is_err());
    }
}
