//! Match runner process ownership and process-tree termination.
//!
//! The runner starts one child per engine instance. Aborting a session has to
//! take all of them down, which every platform does differently; the
//! [`ProcessTreeKiller`] trait hides the strategy.

use std::io::{self, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus};

use tracing::{info, warn};

/// Forcefully terminates a process and all of its descendants.
pub trait ProcessTreeKiller {
    fn kill_tree(&self, child: &mut Child) -> io::Result<()>;

    /// Adjust the command before spawning so the tree can later be found.
    fn prepare(&self, _command: &mut Command) {}
}

/// Unix: run the child as leader of a fresh process group and signal the
/// whole group.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessGroupKiller;

#[cfg(unix)]
impl ProcessTreeKiller for ProcessGroupKiller {
    fn kill_tree(&self, child: &mut Child) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => {
                warn!(pid = child.id(), %errno, "killpg failed, killing runner only");
                child.kill()
            }
        }
    }

    fn prepare(&self, command: &mut Command) {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
}

/// Windows: `taskkill /F /T` walks the tree for us.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskKill;

#[cfg(windows)]
impl ProcessTreeKiller for TaskKill {
    fn kill_tree(&self, child: &mut Child) -> io::Result<()> {
        let status = Command::new("taskkill")
            .args(["/F", "/T", "/PID", &child.id().to_string()])
            .status()?;
        if !status.success() {
            warn!(pid = child.id(), %status, "taskkill failed, killing runner only");
            child.kill()?;
        }
        Ok(())
    }
}

/// The strategy for the platform we were built for.
pub fn platform_killer() -> Box<dyn ProcessTreeKiller> {
    #[cfg(unix)]
    {
        Box::new(ProcessGroupKiller)
    }
    #[cfg(windows)]
    {
        Box::new(TaskKill)
    }
}

/// A running match session.
pub struct MatchProcess {
    child: Child,
    killer: Box<dyn ProcessTreeKiller>,
}

impl MatchProcess {
    /// Spawn `command` with the platform's tree-kill strategy.
    pub fn spawn(command: Command) -> io::Result<Self> {
        Self::spawn_with(command, platform_killer())
    }

    pub fn spawn_with(mut command: Command, killer: Box<dyn ProcessTreeKiller>) -> io::Result<Self> {
        killer.prepare(&mut command);
        let child = command.spawn()?;
        Ok(Self { child, killer })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Take the runner's stdout. Only the first call returns a reader.
    pub fn take_output(&mut self) -> Option<BufReader<ChildStdout>> {
        self.child.stdout.take().map(BufReader::new)
    }

    /// Wait for the runner to exit on its own.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Kill the runner and every engine it started, then reap it.
    pub fn terminate(&mut self) -> io::Result<ExitStatus> {
        info!(pid = self.child.id(), "terminating match session");
        self.killer.kill_tree(&mut self.child)?;
        self.child.wait()
    }
}
