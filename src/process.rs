//! Spawning scripts and capturing their output

use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};

use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("unable to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to capture output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} was terminated: {status}")]
    Terminated { program: String, status: String },
}

/// One process to start: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: PathBuf,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Combined stdout and stderr of a finished process, and how it ended.
#[derive(Debug)]
pub struct ProcessOutput {
    pub output: String,
    /// Exit code, or why the process could not be run to an exit code
    pub result: Result<i32, ProcessError>,
}

impl ProcessOutput {
    #[must_use]
    pub fn exited(output: impl Into<String>, code: i32) -> Self {
        ProcessOutput {
            output: output.into(),
            result: Ok(code),
        }
    }

    #[must_use]
    pub fn failed(output: impl Into<String>, error: ProcessError) -> Self {
        ProcessOutput {
            output: output.into(),
            result: Err(error),
        }
    }
}

/// Runs a process to completion, blocking until it exits.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> ProcessOutput;
}

/// Runs processes on the host, inheriting environment and stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn_and_capture(invocation: &Invocation, program: &str) -> ProcessOutput {
        let (mut reader, writer) = match io::pipe() {
            Ok(pipe) => pipe,
            Err(source) => {
                return ProcessOutput::failed(
                    "",
                    ProcessError::Io {
                        program: program.to_string(),
                        source,
                    },
                );
            }
        };
        let stderr_writer = match writer.try_clone() {
            Ok(w) => w,
            Err(source) => {
                return ProcessOutput::failed(
                    "",
                    ProcessError::Io {
                        program: program.to_string(),
                        source,
                    },
                );
            }
        };

        let mut command = ProcessCommand::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::inherit())
            .stdout(writer)
            .stderr(stderr_writer);

        let spawned = command.spawn();
        // Close our copies of the write end so the read below sees EOF when the child exits.
        drop(command);
        let mut child = match spawned {
            Ok(child) => child,
            Err(source) => {
                return ProcessOutput::failed(
                    "",
                    ProcessError::Spawn {
                        program: program.to_string(),
                        source,
                    },
                );
            }
        };

        let mut captured = Vec::new();
        let read = reader.read_to_end(&mut captured);
        let waited = child.wait();
        let output = String::from_utf8_lossy(&captured).into_owned();

        if let Err(source) = read {
            return ProcessOutput::failed(
                output,
                ProcessError::Io {
                    program: program.to_string(),
                    source,
                },
            );
        }
        match waited {
            Ok(status) => ProcessOutput {
                output,
                result: exit_code(program, status),
            },
            Err(source) => ProcessOutput::failed(
                output,
                ProcessError::Io {
                    program: program.to_string(),
                    source,
                },
            ),
        }
    }
}

fn exit_code(program: &str, status: ExitStatus) -> Result<i32, ProcessError> {
    status.code().ok_or_else(|| ProcessError::Terminated {
        program: program.to_string(),
        status: status.to_string(),
    })
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> ProcessOutput {
        debug!(
            "Running '{invocation}' in {}",
            invocation.working_dir.display()
        );
        let program = invocation.program.display().to_string();
        let output = Self::spawn_and_capture(invocation, &program);
        match &output.result {
            Ok(code) => debug!("{program} exited with code {code}"),
            Err(e) => debug!("{program} failed: {e}"),
        }
        output
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, working_dir: PathBuf) -> Invocation {
        Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            working_dir,
        }
    }

    #[test]
    fn test_captures_stdout_and_stderr_in_order() {
        let out = SystemRunner.run(&sh(
            "echo first; echo second >&2; echo third",
            std::env::temp_dir(),
        ));
        assert_eq!(out.output, "first\nsecond\nthird\n");
        assert_eq!(out.result.unwrap(), 0);
    }

    #[test]
    fn test_non_zero_exit_is_reported_as_code() {
        let out = SystemRunner.run(&sh("echo oops; exit 3", std::env::temp_dir()));
        assert_eq!(out.output, "oops\n");
        assert_eq!(out.result.unwrap(), 3);
    }

    #[test]
    fn test_working_directory_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().canonicalize().unwrap();
        let out = SystemRunner.run(&sh("pwd -P", dir_path.clone()));
        assert_eq!(out.output.trim_end(), dir_path.to_string_lossy());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let out = SystemRunner.run(&Invocation {
            program: PathBuf::from("/definitely/not/a/program"),
            args: vec![],
            working_dir: std::env::temp_dir(),
        });
        assert!(out.output.is_empty());
        match out.result {
            Err(ProcessError::Spawn { program, .. }) => {
                assert_eq!(program, "/definitely/not/a/program");
            }
            other => panic!("Expected Spawn error, got: {other:?}"),
        }
    }

    #[test]
    fn test_killed_process_is_terminated_error() {
        let out = SystemRunner.run(&sh("kill -9 $$", std::env::temp_dir()));
        assert!(matches!(out.result, Err(ProcessError::Terminated { .. })));
    }

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-x".into(), "/p/script".into()],
            working_dir: PathBuf::from("/p"),
        };
        assert_eq!(invocation.to_string(), "/bin/sh -x /p/script");
    }
}
