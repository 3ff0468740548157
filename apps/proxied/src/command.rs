//! Process boundary
//!
//! Every native utility (`gsettings`, `kreadconfig5`, `networksetup`, `reg`) is
//! invoked through [`CommandRunner`], so the stores built on top of it can be
//! exercised with a scripted runner in tests.

use crate::error::{ProxiedError, Result};
use std::process::Command;
use tracing::{debug, trace};

/// Runs a program to completion and returns its standard output
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).run(program, args)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] backed by `std::process::Command`
///
/// Arguments are passed to the program directly; no shell is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let line = command_line(program, args);
        debug!("Running `{}`", line);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ProxiedError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProxiedError::CommandFailed {
                command: line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!("`{}` printed {} bytes", line, stdout.len());
        Ok(stdout)
    }
}

/// Render a command for logs and error messages
///
/// Arguments that are empty or contain whitespace are double-quoted.
pub fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.chars().any(char::is_whitespace) {
            line.push('"');
            line.push_str(arg);
            line.push('"');
        } else {
            line.push_str(arg);
        }
    }
    line
}
