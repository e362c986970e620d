/*!
Command dispatcher module.

Layout:
  src/cmd/
    mod.rs          (this file: module declarations + re-exports)
    meta.rs         (MetaArgs + execute_meta: fetch -> rows -> table)
    format.rs       (tab-stop alignment grid, duration strings)

Conventions:
  - Each subcommand module exposes exactly one public `execute_*` function
    that returns `anyhow::Result<()>`.
  - Argument structs derive `clap::Args` and are kept minimal.
  - Formatting helpers never print directly; they write to the
    `io::Write` they are handed.
*/

pub mod format;
pub mod meta;

pub use meta::{MetaArgs, execute_meta};
