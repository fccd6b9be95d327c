use std::fmt;

use serde::{Deserialize, Serialize};

/// 回复给远端进程的指令，集合是封闭的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasterCommand {
    Ok,
    Success,
    Shutdown,
    Commit,
}

impl MasterCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasterCommand::Ok => "OK",
            MasterCommand::Success => "SUCCESS",
            MasterCommand::Shutdown => "SHUTDOWN",
            MasterCommand::Commit => "COMMIT",
        }
    }
}

impl fmt::Display for MasterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
