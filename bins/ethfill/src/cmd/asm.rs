use bytecode::{Bytecode, EncodingError};
use clap::Parser;
use primitives::hex;

/// Errors of `ethfill asm`.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// `asm` subcommand
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Mnemonic source, e.g. `PUSH1 0x01 PUSH1 0x00 SSTORE`, or hex with `--disassemble`
    #[arg(required = true)]
    source: String,
    /// Treat the input as hex bytecode and print its mnemonics
    #[arg(short, long)]
    disassemble: bool,
}

impl Cmd {
    /// Runs `asm` command.
    pub fn run(&self) -> Result<(), Error> {
        println!("{}", self.render()?);
        Ok(())
    }

    fn render(&self) -> Result<String, Error> {
        if self.disassemble {
            let bytes = hex::decode(self.source.trim())?;
            Ok(Bytecode::raw(bytes).to_asm())
        } else {
            let code = Bytecode::from_asm(&self.source)?;
            Ok(hex::encode_prefixed(code.as_slice()))
        }
    }
}
