use arena_solana_utils::{Program, ProgramExt};
use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};
use typed_builder::TypedBuilder;

use crate::{accounts::instruction_discriminator, constants::PROGRAM_ID, pda};

/// Name of the settlement instruction.
pub const FINALIZE_TOURNAMENT: &str = "finalize_tournament";

/// The tournament program.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
pub struct TournamentProgram {
    /// Program ID.
    #[builder(default = PROGRAM_ID)]
    #[serde_as(as = "DisplayFromStr")]
    pub id: Pubkey,
    /// Platform treasury receiving the platform fee.
    #[serde_as(as = "DisplayFromStr")]
    pub treasury: Pubkey,
}

impl Program for TournamentProgram {
    fn id(&self) -> &Pubkey {
        &self.id
    }
}

impl TournamentProgram {
    /// Find tournament address.
    pub fn find_tournament_address(&self, creator: &Pubkey, id: u64) -> Pubkey {
        pda::find_tournament_address(creator, id, &self.id).0
    }

    /// Find vault address.
    pub fn find_vault_address(&self, tournament: &Pubkey) -> Pubkey {
        pda::find_vault_address(tournament, &self.id).0
    }

    /// Find user portfolio address.
    pub fn find_user_portfolio_address(&self, tournament: &Pubkey, user: &Pubkey) -> Pubkey {
        pda::find_user_portfolio_address(tournament, user, &self.id).0
    }

    /// Find the platform authority address.
    pub fn find_platform_authority_address(&self) -> Pubkey {
        pda::find_platform_authority_address(&self.id).0
    }

    /// Create a `finalize_tournament` instruction paying out the vault to `winner`.
    pub fn finalize_tournament(
        &self,
        tournament: &Pubkey,
        authority: &Pubkey,
        winner: &Pubkey,
    ) -> Instruction {
        self.instruction(finalize_tournament_data(winner))
            .accounts(vec![
                AccountMeta::new(*tournament, false),
                AccountMeta::new_readonly(self.find_platform_authority_address(), false),
                AccountMeta::new(*authority, true),
                AccountMeta::new(self.find_vault_address(tournament), false),
                AccountMeta::new(*winner, false),
                AccountMeta::new(self.treasury, false),
                AccountMeta::new_readonly(system_program::ID, false),
            ])
            .build()
    }
}

/// Instruction data of `finalize_tournament`.
pub fn finalize_tournament_data(winner: &Pubkey) -> Vec<u8> {
    let mut data = instruction_discriminator(FINALIZE_TOURNAMENT).to_vec();
    if let Err(err) = BorshSerialize::serialize(&winner.to_bytes(), &mut data) {
        tracing::error!(%err, "failed to serialize instruction args");
    }
    data
}
