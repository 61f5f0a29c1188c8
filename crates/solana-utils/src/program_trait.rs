use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

/// A solana program.
pub trait Program {
    /// Returns the current program ID.
    fn id(&self) -> &Pubkey;
}

impl<P: Program> Program for &P {
    fn id(&self) -> &Pubkey {
        (**self).id()
    }
}

impl Program for Pubkey {
    fn id(&self) -> &Pubkey {
        self
    }
}

/// Extension trait for [`Program`].
pub trait ProgramExt: Program {
    /// Create an [`InstructionBuilder`]
    fn instruction(&self, data: Vec<u8>) -> InstructionBuilder<Self>
    where
        Self: Sized,
    {
        InstructionBuilder {
            program: self,
            data,
            accounts: vec![],
        }
    }
}

impl<P: ?Sized + Program> ProgramExt for P {}

/// Generic Instruction Builder.
#[derive(Debug, Clone)]
pub struct InstructionBuilder<'a, P> {
    program: &'a P,
    data: Vec<u8>,
    accounts: Vec<AccountMeta>,
}

impl<P> InstructionBuilder<'_, P> {
    /// Append accounts to account list.
    pub fn accounts(mut self, mut accounts: Vec<AccountMeta>) -> Self {
        self.accounts.append(&mut accounts);
        self
    }
}

impl<P: Program> InstructionBuilder<'_, P> {
    /// Build an [`Instruction`].
    pub fn build(self) -> Instruction {
        Instruction {
            program_id: *self.program.id(),
            accounts: self.accounts,
            data: self.data,
        }
    }
}
