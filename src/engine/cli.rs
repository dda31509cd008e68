//! Command-line interface for the desktop harness.

use std::env;

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Run the lifecycle once and print poses.
    Run { frames: u32 },
    /// Stream poses to an InfraNet endpoint (falls back to the configured one).
    Stream { endpoint: Option<String>, seconds: u32 },
    /// Ask InfraNet to shift the scene.
    DomShift {
        scene: String,
        reason: String,
        endpoint: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CLI {
    pub command: CliCommand,
    /// Use the mock engine instead of OpenXR.
    pub mock: bool,
}

impl CLI {
    /// Parse command-line arguments.
    ///
    /// Supported commands:
    /// - `./xrphone [run] [--frames N] [--mock]`
    /// - `./xrphone stream [endpoint] [--seconds N] [--mock]`
    /// - `./xrphone dom-shift <scene> [reason] [--endpoint URL]`
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Self {
        let mut positional = Vec::new();
        let mut mock = false;
        let mut frames = 10;
        let mut seconds = 10;
        let mut endpoint = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--mock" => mock = true,
                "--frames" => frames = Self::number(args.next(), "--frames", frames),
                "--seconds" => seconds = Self::number(args.next(), "--seconds", seconds),
                "--endpoint" => match args.next() {
                    Some(url) => endpoint = Some(url),
                    None => eprintln!("--endpoint expects a URL"),
                },
                _ => positional.push(arg),
            }
        }

        let command = match positional.first().map(String::as_str) {
            Some("stream") => CliCommand::Stream {
                endpoint: positional.get(1).cloned().or(endpoint),
                seconds,
            },
            Some("dom-shift") => match positional.get(1) {
                Some(scene) => CliCommand::DomShift {
                    scene: scene.clone(),
                    reason: positional.get(2).cloned().unwrap_or_else(|| "user".to_string()),
                    endpoint,
                },
                None => {
                    eprintln!("dom-shift needs a scene. Running normally.");
                    CliCommand::Run { frames }
                }
            },
            None | Some("run") => CliCommand::Run { frames },
            Some(other) => {
                eprintln!("Unknown command: {}. Running normally.", other);
                CliCommand::Run { frames }
            }
        };

        CLI { command, mock }
    }

    fn number(value: Option<String>, flag: &str, fallback: u32) -> u32 {
        match value.as_deref().map(str::parse::<u32>) {
            Some(Ok(n)) => n,
            _ => {
                eprintln!("{} expects a number, using {}", flag, fallback);
                fallback
            }
        }
    }
}
