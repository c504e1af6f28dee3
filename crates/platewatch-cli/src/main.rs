// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use platewatch_api::Client;
use platewatch_app::AppState;
use platewatch_testkit::MemoryFleet;
use platewatch_tui::UiOptions;
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::path::PathBuf;
use time::UtcOffset;

const DEMO_SEED: u64 = 20_240_501;
const DEMO_FLEET_SIZE: usize = 60;

fn main() {
    // Must run before any thread exists or the local offset is unsound to read.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    if let Err(error) = run(offset) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run(offset: UtcOffset) -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let mut config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `platewatch --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    if let Some(server) = &options.server {
        config.override_base_url(server)?;
    }

    let client = Client::new(config.base_url(), config.timeout()?).with_context(|| {
        format!(
            "invalid [server] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        if !options.demo {
            client.ping().context("server check failed")?;
        }
        println!("ok: {}", config.base_url());
        return Ok(());
    }

    logging::init(&config.log_file()?, config.log_level())?;
    tracing::info!(
        base_url = config.base_url(),
        demo = options.demo,
        "starting platewatch"
    );

    let mut state = AppState {
        active_view: config.start_view(),
        ..AppState::default()
    };
    let ui = UiOptions {
        autoplay: config.autoplay(),
        offset,
    };

    if options.demo {
        let mut runtime = DemoRuntime::new(MemoryFleet::demo(DEMO_SEED, DEMO_FLEET_SIZE));
        return platewatch_tui::run_app(&mut state, &mut runtime, ui);
    }

    let player = runtime::player_from_config(config.player(), config.player_args());
    let mut runtime = ApiRuntime::new(client, player);
    platewatch_tui::run_app(&mut state, &mut runtime, ui)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    server: Option<String>,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        server: None,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--server" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--server requires a URL such as http://127.0.0.1:5000")
                })?;
                options.server = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("platewatch");
    println!("  --config <path>          Use a specific config path");
    println!("  --server <url>           Backend base URL (overrides [server].base_url)");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Browse a generated in-memory fleet, no server");
    println!("  --check                  Validate config and reach the server");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/platewatch-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                server: None,
                print_config_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_and_server_overrides() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--config",
                "/custom/config.toml",
                "--server",
                "http://cam.local:5000",
            ],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        assert_eq!(options.server.as_deref(), Some("http://cam.local:5000"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--server"], default_options_path())
            .expect_err("missing server value should fail");
        assert!(error.to_string().contains("--server requires a URL"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_check_and_demo_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check", "--demo"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(options.demo);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
