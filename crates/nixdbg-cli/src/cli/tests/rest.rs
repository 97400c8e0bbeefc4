//! Tests for check-userns, manifest, checksum, completions, man.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::CommandFactory;
use std::path::PathBuf;

#[test]
fn cli_parse_check_userns() {
    match parse(&["nixdbg", "check-userns"]) {
        CliCommand::CheckUserns => {}
        _ => panic!("expected CheckUserns"),
    }
}

#[test]
fn cli_parse_manifest_print() {
    match parse(&["nixdbg", "manifest"]) {
        CliCommand::Manifest { write } => assert!(write.is_none()),
        _ => panic!("expected Manifest"),
    }
}

#[test]
fn cli_parse_manifest_write() {
    match parse(&["nixdbg", "manifest", "--write", "debug-shell"]) {
        CliCommand::Manifest { write } => assert_eq!(write, Some(PathBuf::from("debug-shell"))),
        _ => panic!("expected Manifest"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["nixdbg", "checksum", "/path/to/nix.tar.xz"]) {
        CliCommand::Checksum { path } => assert_eq!(path, "/path/to/nix.tar.xz"),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["nixdbg", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_man() {
    match parse(&["nixdbg", "man"]) {
        CliCommand::Man => {}
        _ => panic!("expected Man"),
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}
