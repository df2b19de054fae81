//! Renders the `ackframe` man page from the CLI definition.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli.rs"]
mod cli;

/// Stable copy for packaging, next to the build output.
const MAN_DIR: &str = "target/generated-man";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let cmd = cli::Cli::command();
    let page = format!("{}.1", cmd.get_name());
    let mut buf = Vec::new();
    Man::new(cmd)
        .source(concat!("ackframe ", env!("CARGO_PKG_VERSION")))
        .manual("Broker client tools")
        .render(&mut buf)?;

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or("OUT_DIR not set")?);
    for dir in [out_dir.as_path(), Path::new(MAN_DIR)] {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(&page), &buf)?;
    }
    Ok(())
}
