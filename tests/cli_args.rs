// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;
use tsrun::cli::CliArgs;
use tsrun::types::{OutputLevel, TeardownPolicy};

#[test]
fn defaults_compile_in_development_and_run_from_a_temporary_file() {
    let args = CliArgs::parse_from(["tsrun", "src/index.ts"]);
    let options = args.compile_options();

    assert_eq!(options.entry, "src/index.ts");
    assert_eq!(options.output, None);
    assert_eq!(options.project, PathBuf::from("tsconfig.json"));
    assert!(options.dev);
    assert!(!options.watch);
    assert!(!options.check_types);
    assert_eq!(options.output_level, OutputLevel::Normal);
    assert_eq!(options.teardown, TeardownPolicy::OnCompileStart);
}

#[test]
fn flags_map_onto_compile_options() {
    let args = CliArgs::parse_from([
        "tsrun",
        "src/server.ts",
        "-o",
        "dist/",
        "-p",
        "tsconfig.build.json",
        "-w",
        "-t",
        "--release",
        "--run",
        "-e",
        "node worker.js",
        "-c",
        "ci.toml",
        "--keep-alive-on-failure",
        "-q",
        "--",
        "--port",
        "8080",
    ]);
    let options = args.compile_options();

    assert_eq!(options.output, Some(PathBuf::from("dist/")));
    assert_eq!(options.project, PathBuf::from("tsconfig.build.json"));
    assert_eq!(options.override_config, Some(PathBuf::from("ci.toml")));
    assert!(options.watch);
    assert!(options.check_types);
    assert!(!options.dev);
    assert!(options.run);
    assert_eq!(options.exec.as_deref(), Some("node worker.js"));
    assert_eq!(options.teardown, TeardownPolicy::KeepUntilSuccess);
    assert_eq!(options.output_level, OutputLevel::Quiet);
    assert_eq!(options.run_args, vec!["--port".to_string(), "8080".to_string()]);
}

#[test]
fn silent_wins_over_quiet() {
    let args = CliArgs::parse_from(["tsrun", "index.ts", "-q", "-s"]);
    assert_eq!(args.compile_options().output_level, OutputLevel::Silent);
}

#[test]
fn entry_is_required() {
    assert!(CliArgs::try_parse_from(["tsrun"]).is_err());
}
