//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::GatewayConfig;

/// pagelift - crop pages out of photos through an OpenAI-style images API
#[derive(Debug, Parser)]
#[command(name = "pagelift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (.toml, .yaml or .json)
    #[arg(short = 'c', long, env = "PAGELIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Load the model at startup instead of on the first request
    #[arg(long)]
    pub preload: bool,
}

impl Cli {
    /// Apply flags on top of the file/environment configuration.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.preload {
            config.model.preload = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from(["pagelift", "--host", "127.0.0.1", "-p", "9001", "--preload"]);
        let mut config = GatewayConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.bind_addr(), "127.0.0.1:9001");
        assert!(config.model.preload);
    }

    #[test]
    fn absent_flags_keep_config() {
        let cli = Cli::parse_from(["pagelift"]);
        let mut config = GatewayConfig::default();
        config.port = 9100;
        cli.apply(&mut config);
        assert_eq!(config.port, 9100);
        assert!(!config.model.preload);
    }
}
