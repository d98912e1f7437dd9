use std::ffi::OsString;

use clap::Command;
use clap::CommandFactory;
use clap_complete::{Generator, Shell};
#[path = "src/cli.rs"]
mod cli;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command, outdir: impl Into<OsString>) {
    if let Err(e) = clap_complete::generate_to(gen, cmd, cmd.get_name().to_string(), outdir) {
        println!("cargo:warning=failed to generate completions: {e}");
    }
}

fn main() {
    println!("cargo:rerun-if-changed=src/cli.rs");
    let outdir = "completion_scripts";
    if let Err(e) = std::fs::create_dir_all(outdir) {
        println!("cargo:warning=cannot create {outdir}: {e}");
        return;
    }
    let mut cmd = cli::Cli::command();
    for shell in [Shell::Zsh, Shell::Bash, Shell::Fish, Shell::PowerShell, Shell::Elvish] {
        print_completions(shell, &mut cmd, outdir);
    }
}
