//! Command-line parsing contracts for the syncspace binary

use clap::{CommandFactory, Parser};
use syncspace::tooling::cli::{Cli, Commands};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["syncspace", "import", "--workspace", "ws", "--repo", "acme/demo"],
        vec![
            "syncspace",
            "import",
            "--workspace",
            "ws",
            "--repo",
            "https://github.com/acme/demo",
            "--branch",
            "dev",
            "--format",
            "json",
        ],
        vec!["syncspace", "inspect", "--workspace", "ws"],
        vec!["syncspace", "inspect", "--workspace", "ws", "--file", "src/index.ts"],
        vec!["syncspace", "encode-path", "src/index.ts"],
        vec!["syncspace", "decode-id", "c3JjL2luZGV4LnRz"],
        vec!["syncspace", "config"],
        vec!["syncspace", "--log-format", "json", "--log-output", "stdout", "config"],
        vec!["syncspace", "--verbose", "config", "--format", "json"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_invocations() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["syncspace"],
        vec!["syncspace", "import", "--repo", "acme/demo"],
        vec!["syncspace", "import", "--workspace", "ws"],
        vec!["syncspace", "inspect"],
        vec!["syncspace", "decode-id"],
        vec!["syncspace", "scan"],
    ];

    for args in cases {
        assert!(
            Cli::try_parse_from(args.clone()).is_err(),
            "expected parse failure for args: {args:?}"
        );
    }
}

#[test]
fn import_branch_defaults_to_main() {
    let cli = Cli::try_parse_from([
        "syncspace",
        "import",
        "--workspace",
        "ws",
        "--repo",
        "acme/demo",
    ])
    .unwrap();
    match cli.command {
        Commands::Import { branch, format, .. } => {
            assert_eq!(branch, "main");
            assert_eq!(format, "text");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn help_lists_every_subcommand() {
    let help = Cli::command().render_help().to_string();
    for name in ["import", "inspect", "encode-path", "decode-id", "config"] {
        assert!(help.contains(name), "help is missing {name}");
    }
}
