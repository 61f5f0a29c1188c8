use solana_sdk::pubkey::Pubkey;

use crate::constants::{
    PLATFORM_AUTHORITY_SEED, TOURNAMENT_SEED, USER_PORTFOLIO_SEED, VAULT_SEED,
};

/// Find PDA for a tournament created by `creator` with the given id.
pub fn find_tournament_address(creator: &Pubkey, id: u64, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[TOURNAMENT_SEED, creator.as_ref(), &id.to_le_bytes()],
        program_id,
    )
}

/// Find PDA for the vault holding the entry fees of a tournament.
pub fn find_vault_address(tournament: &Pubkey, program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, tournament.as_ref()], program_id)
}

/// Find PDA for the portfolio `user` registered in a tournament.
pub fn find_user_portfolio_address(
    tournament: &Pubkey,
    user: &Pubkey,
    program_id: &Pubkey,
) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[USER_PORTFOLIO_SEED, tournament.as_ref(), user.as_ref()],
        program_id,
    )
}

/// Find PDA for the platform authority.
pub fn find_platform_authority_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[PLATFORM_AUTHORITY_SEED], program_id)
}
