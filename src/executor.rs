use crate::signal::INTERRUPTS;
use std::process::{Command, ExitStatus};

pub trait ShellRunner {
    fn run(&mut self, command: &str) -> i32;
}

pub struct SystemShell {
    shell: String,
}

impl SystemShell {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

impl ShellRunner for SystemShell {
    fn run(&mut self, command: &str) -> i32 {
        if command.trim().is_empty() {
            return 1;
        }

        let _child = INTERRUPTS.child();
        match Command::new(&self.shell).arg("-c").arg(command).status() {
            Ok(status) => exit_code(status),
            Err(e) => {
                tracing::warn!("failed to spawn {}: {}", self.shell, e);
                1
            }
        }
    }
}
