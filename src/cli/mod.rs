//! CLI command implementations.
//!
//! Argument parsing lives in the binary; these functions take parsed values
//! and write their human-readable output to any [`std::io::Write`].
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Run the pipeline in the foreground until interrupted |
//! | `serve` | Serve JSON-RPC on stdio, optionally with the pipeline |
//! | `status` | Show the latest activity score |
//! | `repos` | List known repositories |
//! | `show` | Print a repository's memory |
//! | `record` | Append a memory entry by hand |
//! | `resolve` | Print the repository id of a path |
//! | `config` | Print the effective configuration |

mod inspect;
mod record;
mod run;

pub use inspect::{cmd_config, cmd_repos, cmd_resolve, cmd_show, cmd_status};
pub use record::{RecordTarget, cmd_record};
pub use run::{cmd_run, cmd_serve};

use crate::Error;

fn write_error(e: std::io::Error) -> Error {
    Error::operation("write_output", e)
}
