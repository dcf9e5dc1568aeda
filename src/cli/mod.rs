pub(crate) mod catalog;
pub(crate) mod codec;
pub(crate) mod command;
pub(crate) mod image;
pub(crate) mod read;
pub(crate) mod ui;
pub(crate) mod write;

pub use self::command::{
    Args, Backend, Command, DecodeArgs, DiameterArg, EncodeArgs, FakeArgs, InitImageArgs,
    LogLevel, OutputFormat, RecordArgs, RunOptions, SerialPolicyArg, WriteArgs,
};
