// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

pub(crate) use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "forwarder")]
#[command(version = "0.1")]
#[command(about = "Cross-connects network service connections through the forwarding engine", long_about = None)]
pub(crate) struct CmdArgs {
    #[arg(long, value_name = "yaml file", help = "Forwarder settings")]
    settings: Option<PathBuf>,

    #[arg(long, value_name = "yaml file", help = "Network service request to serve")]
    request: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = false,
        help = "Close the connection once established"
    )]
    close: bool,

    #[arg(
        long,
        default_value_t = false,
        help = "Show the available tracing tags and exit"
    )]
    show_tracing_tags: bool,

    #[arg(
        long,
        value_name = "tag=level,...",
        help = "Tracing configuration, e.g. default=error,all=info,mechanisms=debug"
    )]
    tracing: Option<String>,
}

impl CmdArgs {
    pub fn settings(&self) -> Option<&Path> {
        self.settings.as_deref()
    }
    pub fn request(&self) -> Option<&Path> {
        self.request.as_deref()
    }
    pub fn close(&self) -> bool {
        self.close
    }
    pub fn show_tracing_tags(&self) -> bool {
        self.show_tracing_tags
    }
    pub fn tracing(&self) -> Option<&String> {
        self.tracing.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::{CmdArgs, Parser};
    use std::path::Path;

    #[test]
    fn request_and_close() {
        let args = CmdArgs::parse_from([
            "forwarder",
            "--settings",
            "/etc/forwarder.yaml",
            "--request",
            "req.yaml",
            "--close",
            "--tracing",
            "all=debug",
        ]);
        assert_eq!(args.settings(), Some(Path::new("/etc/forwarder.yaml")));
        assert_eq!(args.request(), Some(Path::new("req.yaml")));
        assert!(args.close());
        assert!(!args.show_tracing_tags());
        assert_eq!(args.tracing().map(String::as_str), Some("all=debug"));
    }

    #[test]
    fn only_tags() {
        let args = CmdArgs::parse_from(["forwarder", "--show-tracing-tags"]);
        assert!(args.show_tracing_tags());
        assert!(args.settings().is_none());
        assert!(CmdArgs::try_parse_from(["forwarder", "--bogus"]).is_err());
    }
}
