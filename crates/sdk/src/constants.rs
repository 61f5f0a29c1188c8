/// Seed of tournament accounts.
pub const TOURNAMENT_SEED: &[u8] = b"tournament";

/// Seed of tournament vaults.
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed of user portfolios.
pub const USER_PORTFOLIO_SEED: &[u8] = b"user_portfolio";

/// Seed of the platform authority.
pub const PLATFORM_AUTHORITY_SEED: &[u8] = b"platform-authority";

/// Portfolio weights are percentages.
pub const TOTAL_WEIGHT: u32 = 100;

/// Anchor custom error codes of `finalize_tournament`.
pub mod finalize_error {
    /// `TournamentNotEnded`.
    pub const TOURNAMENT_NOT_ENDED: u32 = 6000;
    /// `AlreadyFinalized`.
    pub const ALREADY_FINALIZED: u32 = 6001;
    /// `InvalidWinnerAccount`.
    pub const INVALID_WINNER_ACCOUNT: u32 = 6002;
    /// `NotTournamentAuthority`.
    ///
    /// Not declared by the program's error enum. The code assumes it would be
    /// appended after `InvalidWinnerAccount`; an unknown code is still reported
    /// as a rejection with its raw number.
    pub const NOT_TOURNAMENT_AUTHORITY: u32 = 6003;

    /// Name of a known error code.
    pub fn name(code: u32) -> Option<&'static str> {
        match code {
            TOURNAMENT_NOT_ENDED => Some("TournamentNotEnded"),
            ALREADY_FINALIZED => Some("AlreadyFinalized"),
            INVALID_WINNER_ACCOUNT => Some("InvalidWinnerAccount"),
            NOT_TOURNAMENT_AUTHORITY => Some("NotTournamentAuthority"),
            _ => None,
        }
    }
}

mod portfolio_tournaments {
    solana_sdk::declare_id!("7xaAXMNqwo3wCmTawLKchSbwZJchTkcnFxb1nLHnbg4u");
}

/// Default tournament program ID.
pub const PROGRAM_ID: solana_sdk::pubkey::Pubkey = portfolio_tournaments::ID;
