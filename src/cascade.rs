//! Ordered fallback of execution strategies
//!
//! A resolved script is run by trying [`Strategy::ORDER`] in sequence: the file itself if it
//! is executable, then the interpreter from its shebang, then a shell. The first strategy that
//! gets a process to run to an exit code handles the script, whatever that exit code is. If
//! all three fail, only the last failure is reported.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::commands::classify::FileClassification;
use crate::commands::locator::CommandReference;
use crate::process::{Invocation, ProcessError, ProcessOutput, ProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Spawn the script itself
    Direct,
    /// Spawn the interpreter named on the shebang line
    Shebang,
    /// Spawn the configured shell with the script as argument
    DefaultShell,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [Strategy::Direct, Strategy::Shebang, Strategy::DefaultShell];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Direct => "direct",
            Strategy::Shebang => "shebang",
            Strategy::DefaultShell => "default shell",
        })
    }
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("You don't have permission to run this command: {}", .0.display())]
    Permission(PathBuf),
    #[error("{} has no shebang", .0.display())]
    NoShebang(PathBuf),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Outcome of one strategy
#[derive(Debug)]
pub struct ExecutionAttempt {
    pub strategy: Strategy,
    pub output: String,
    /// Exit code when the strategy handled the script
    pub result: Result<i32, StrategyError>,
}

impl ExecutionAttempt {
    fn precondition_failed(strategy: Strategy, error: StrategyError) -> Self {
        ExecutionAttempt {
            strategy,
            output: String::new(),
            result: Err(error),
        }
    }

    fn from_process(strategy: Strategy, process: ProcessOutput) -> Self {
        ExecutionAttempt {
            strategy,
            output: process.output,
            result: process.result.map_err(StrategyError::from),
        }
    }
}

/// Outcome of the whole cascade
#[derive(Debug)]
pub struct ExecutionResult {
    /// A strategy handled the script
    pub done: bool,
    /// Output of the handling strategy, or of the last one tried
    pub output: String,
    /// Failure of the last strategy when none handled the script
    pub error: Option<StrategyError>,
    /// Strategy the output came from
    pub strategy: Strategy,
    /// Exit code of the script when handled
    pub exit_code: Option<i32>,
}

impl From<ExecutionAttempt> for ExecutionResult {
    fn from(attempt: ExecutionAttempt) -> Self {
        let (done, error, exit_code) = match attempt.result {
            Ok(code) => (true, None, Some(code)),
            Err(e) => (false, Some(e), None),
        };
        ExecutionResult {
            done,
            output: attempt.output,
            error,
            strategy: attempt.strategy,
            exit_code,
        }
    }
}

/// Settings a cascade run needs beyond the script itself
#[derive(Debug, Clone)]
pub struct ExecSettings {
    /// Shell for [`Strategy::DefaultShell`]
    pub shell: PathBuf,
    /// Directory every spawned process starts in
    pub working_dir: PathBuf,
    /// Extra arguments passed on to the script
    pub args: Vec<OsString>,
}

pub struct ExecutionCascade<'a> {
    runner: &'a dyn ProcessRunner,
    settings: ExecSettings,
}

impl<'a> ExecutionCascade<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn ProcessRunner, settings: ExecSettings) -> Self {
        ExecutionCascade { runner, settings }
    }

    /// Try each strategy in order, stopping at the first that handles the script.
    #[must_use]
    pub fn execute(
        &self,
        reference: &CommandReference,
        classification: &FileClassification,
    ) -> ExecutionResult {
        let [first, rest @ ..] = Strategy::ORDER;
        let mut attempt = self.attempt(first, reference, classification);
        for strategy in rest {
            if attempt.result.is_ok() {
                break;
            }
            attempt = self.attempt(strategy, reference, classification);
        }

        match &attempt.result {
            Ok(code) => info!(
                "'{}' handled by {} strategy (exit code {code})",
                reference.name, attempt.strategy
            ),
            Err(e) => warn!("No strategy could run '{}': {e}", reference.name),
        }
        attempt.into()
    }

    fn attempt(
        &self,
        strategy: Strategy,
        reference: &CommandReference,
        classification: &FileClassification,
    ) -> ExecutionAttempt {
        let attempt = match self.invocation(strategy, reference, classification) {
            Ok(invocation) => {
                ExecutionAttempt::from_process(strategy, self.runner.run(&invocation))
            }
            Err(e) => ExecutionAttempt::precondition_failed(strategy, e),
        };
        if let Err(e) = &attempt.result {
            debug!("{strategy} strategy failed for '{}': {e}", reference.name);
        }
        attempt
    }

    /// Build the process a strategy would spawn, or say why it cannot apply.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError::Permission` for [`Strategy::Direct`] without the execute bit and
    /// `StrategyError::NoShebang` for [`Strategy::Shebang`] without a shebang line.
    pub fn invocation(
        &self,
        strategy: Strategy,
        reference: &CommandReference,
        classification: &FileClassification,
    ) -> Result<Invocation, StrategyError> {
        let path = reference.path.as_path();
        let (program, mut args) = match strategy {
            Strategy::Direct => {
                if !classification.has_exec_permission {
                    return Err(StrategyError::Permission(path.to_path_buf()));
                }
                (path.to_path_buf(), Vec::new())
            }
            Strategy::Shebang => {
                let shebang = classification
                    .shebang
                    .as_deref()
                    .ok_or_else(|| StrategyError::NoShebang(path.to_path_buf()))?;
                shebang_command(shebang, path)
            }
            Strategy::DefaultShell => (
                self.settings.shell.clone(),
                vec![path.as_os_str().to_os_string()],
            ),
        };
        args.extend(self.settings.args.iter().cloned());
        Ok(Invocation {
            program,
            args,
            working_dir: self.settings.working_dir.clone(),
        })
    }
}

/// Split a shebang on single spaces into interpreter and arguments, then append the script.
fn shebang_command(shebang: &str, script: &Path) -> (PathBuf, Vec<OsString>) {
    let mut parts = shebang.split(' ');
    let interpreter = PathBuf::from(parts.next().unwrap_or_default());
    let mut args: Vec<OsString> = parts.map(OsString::from).collect();
    args.push(script.as_os_str().to_os_string());
    (interpreter, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    /// Records invocations and replays canned outputs; exits 0 once the script runs out.
    #[derive(Default)]
    struct SpyRunner {
        calls: RefCell<Vec<Invocation>>,
        responses: RefCell<VecDeque<ProcessOutput>>,
    }

    impl SpyRunner {
        fn with_responses(responses: Vec<ProcessOutput>) -> Self {
            SpyRunner {
                calls: RefCell::default(),
                responses: RefCell::new(responses.into()),
            }
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }
    }

    impl ProcessRunner for SpyRunner {
        fn run(&self, invocation: &Invocation) -> ProcessOutput {
            self.calls.borrow_mut().push(invocation.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| ProcessOutput::exited(format!("ran {invocation}"), 0))
        }
    }

    fn spawn_error(program: &str) -> ProcessOutput {
        ProcessOutput::failed(
            format!("{program}: not found"),
            ProcessError::Spawn {
                program: program.to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        )
    }

    fn reference() -> CommandReference {
        CommandReference {
            name: "script".to_string(),
            path: PathBuf::from("/p/.opencmd/commands/script"),
            root: PathBuf::from("/p"),
        }
    }

    fn settings() -> ExecSettings {
        ExecSettings {
            shell: PathBuf::from("/bin/bash"),
            working_dir: PathBuf::from("/p/q"),
            args: Vec::new(),
        }
    }

    fn classification(shebang: Option<&str>, exec: bool) -> FileClassification {
        FileClassification {
            is_binary: false,
            shebang: shebang.map(str::to_string),
            has_exec_permission: exec,
        }
    }

    #[test]
    fn test_executable_runs_directly_only() {
        let runner = SpyRunner::default();
        let cascade = ExecutionCascade::new(&runner, settings());
        let result = cascade.execute(&reference(), &classification(Some("/bin/sh"), true));

        assert!(result.done);
        assert_eq!(result.strategy, Strategy::Direct);
        assert_eq!(result.exit_code, Some(0));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("/p/.opencmd/commands/script"));
        assert!(calls[0].args.is_empty());
        assert_eq!(calls[0].working_dir, PathBuf::from("/p/q"));
    }

    #[test]
    fn test_shebang_splits_interpreter_arguments() {
        let runner = SpyRunner::default();
        let cascade = ExecutionCascade::new(&runner, settings());
        let result = cascade.execute(&reference(), &classification(Some("/bin/sh -x"), false));

        assert!(result.done);
        assert_eq!(result.strategy, Strategy::Shebang);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("/bin/sh"));
        assert_eq!(
            calls[0].args,
            vec![
                OsString::from("-x"),
                OsString::from("/p/.opencmd/commands/script")
            ]
        );
    }

    #[test]
    fn test_plain_script_falls_back_to_shell() {
        let runner = SpyRunner::with_responses(vec![ProcessOutput::exited("hello\n", 0)]);
        let cascade = ExecutionCascade::new(&runner, settings());
        let result = cascade.execute(&reference(), &classification(None, false));

        assert!(result.done);
        assert_eq!(result.strategy, Strategy::DefaultShell);
        assert_eq!(result.output, "hello\n");
        assert!(result.error.is_none());
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("/bin/bash"));
        assert_eq!(
            calls[0].args,
            vec![OsString::from("/p/.opencmd/commands/script")]
        );
    }

    #[test]
    fn test_spawn_failure_falls_through() {
        let runner = SpyRunner::with_responses(vec![
            spawn_error("/p/.opencmd/commands/script"),
            ProcessOutput::exited("via shebang\n", 0),
        ]);
        let cascade = ExecutionCascade::new(&runner, settings());
        let result = cascade.execute(&reference(), &classification(Some("/bin/sh"), true));

        assert!(result.done);
        assert_eq!(result.strategy, Strategy::Shebang);
        assert_eq!(result.output, "via shebang\n");
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_non_zero_exit_is_handled() {
        let runner = SpyRunner::with_responses(vec![ProcessOutput::exited("boom\n", 2)]);
        let cascade = ExecutionCascade::new(&runner, settings());
        let result = cascade.execute(&reference(), &classification(Some("/bin/sh"), true));

        assert!(result.done);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(result.output, "boom\n");
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_all_strategies_fail_keeps_last_error() {
        let runner = SpyRunner::with_responses(vec![
            spawn_error("/p/.opencmd/commands/script"),
            spawn_error("/no/interpreter"),
            spawn_error("/bin/bash"),
        ]);
        let cascade = ExecutionCascade::new(&runner, settings());
        let result =
            cascade.execute(&reference(), &classification(Some("/no/interpreter"), true));

        assert!(!result.done);
        assert_eq!(result.strategy, Strategy::DefaultShell);
        assert_eq!(result.output, "/bin/bash: not found");
        assert_eq!(result.exit_code, None);
        match result.error {
            Some(StrategyError::Process(ProcessError::Spawn { program, .. })) => {
                assert_eq!(program, "/bin/bash");
            }
            other => panic!("Expected Spawn error, got: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_preconditions_do_not_spawn() {
        let runner = SpyRunner::default();
        let cascade = ExecutionCascade::new(&runner, settings());
        let c = classification(None, false);

        assert!(matches!(
            cascade.invocation(Strategy::Direct, &reference(), &c),
            Err(StrategyError::Permission(_))
        ));
        assert!(matches!(
            cascade.invocation(Strategy::Shebang, &reference(), &c),
            Err(StrategyError::NoShebang(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_extra_arguments_follow_script() {
        let runner = SpyRunner::default();
        let cascade = ExecutionCascade::new(
            &runner,
            ExecSettings {
                args: vec!["--fast".into(), "x".into()],
                ..settings()
            },
        );
        let c = classification(Some("/usr/bin/env python3"), true);

        let direct = cascade.invocation(Strategy::Direct, &reference(), &c).unwrap();
        assert_eq!(direct.args, vec![OsString::from("--fast"), OsString::from("x")]);

        let shebang = cascade.invocation(Strategy::Shebang, &reference(), &c).unwrap();
        assert_eq!(shebang.program, PathBuf::from("/usr/bin/env"));
        assert_eq!(
            shebang.args,
            vec![
                OsString::from("python3"),
                OsString::from("/p/.opencmd/commands/script"),
                OsString::from("--fast"),
                OsString::from("x"),
            ]
        );
    }

    #[test]
    fn test_error_messages() {
        let path = PathBuf::from("/p/s");
        assert_eq!(
            StrategyError::Permission(path.clone()).to_string(),
            "You don't have permission to run this command: /p/s"
        );
        assert_eq!(
            StrategyError::NoShebang(path).to_string(),
            "/p/s has no shebang"
        );
    }
}
