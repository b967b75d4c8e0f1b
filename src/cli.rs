use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file [default: <config dir>/atlas/config.yml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory for saved conversations [default: <config dir>/atlas/chat-history]
    #[arg(long)]
    pub history_dir: Option<PathBuf>,
    /// Log file [default: <config dir>/atlas/atlas.log]
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
    /// Seconds to wait for a reply
    #[arg(short, long, value_parser = validate_timeout, default_value = "120")]
    pub timeout: u64,
}

fn validate_timeout(val: &str) -> Result<u64, String> {
    val.parse::<u64>()
        .map_err(|_| String::from("Value must be a whole number of seconds"))
        .and_then(|v| {
            if v > 0 {
                Ok(v)
            } else {
                Err(String::from("Value must be greater than zero"))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["atlas"]);
        assert_eq!(cli.timeout, 120);
        assert_eq!(cli.log_level, "info");
        assert!(cli.config.is_none());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(Cli::try_parse_from(["atlas", "--timeout", "0"]).is_err());
        assert!(Cli::try_parse_from(["atlas", "-t", "soon"]).is_err());
        assert_eq!(Cli::parse_from(["atlas", "-t", "30"]).timeout, 30);
    }
}
