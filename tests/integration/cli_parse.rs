use clap::{CommandFactory, Parser};
use resync::policy::{ExistingPolicy, MissingPolicy};
use resync::tooling::cli::{Cli, Mode};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["resync", "push", "a.pdf", "folder"],
        vec!["resync", "+", "-o", "Books/New", "a.pdf"],
        vec!["resync", "pull", "Books/Fiction", "-o", "/tmp"],
        vec!["resync", "-", "Books"],
        vec!["resync", "backup", "-e", "Archive"],
        vec!["resync", "clean", "-y"],
        vec!["resync", "-n", "-vvv", "push", "x.epub"],
        vec!["resync", "push", "--if-exists", "duplicate", "x.pdf"],
        vec!["resync", "push", "--transfer-dir", "/tmp/stage", "--debug", "x.pdf"],
        vec!["resync", "clean", "--local-store", "/mnt/xochitl"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_unknown_modes_and_policies() {
    assert!(Cli::try_parse_from(["resync"]).is_err());
    assert!(Cli::try_parse_from(["resync", "sync"]).is_err());
    assert!(Cli::try_parse_from(["resync", "push", "--if-exists", "merge", "a.pdf"]).is_err());
    assert!(Cli::try_parse_from(["resync", "push", "--if-does-not-exist", "keep"]).is_err());
}

#[test]
fn parse_policies_and_repeated_flags() {
    let cli = Cli::try_parse_from([
        "resync",
        "push",
        "--if-exists",
        "doconly",
        "--if-does-not-exist",
        "delete",
        "-e",
        "a",
        "--exclude",
        "b",
        "-vv",
        "x.pdf",
    ])
    .unwrap();
    assert_eq!(cli.mode, Mode::Push);
    assert_eq!(cli.if_exists, Some(ExistingPolicy::DocOnly));
    assert_eq!(cli.if_does_not_exist, Some(MissingPolicy::Delete));
    assert_eq!(cli.exclude, vec!["a", "b"]);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.documents, vec!["x.pdf"]);
}
