use gwpe_core::derive_substream_seed;

const MOVE_DOMAIN: u64 = 0x5DEE_CE66_D1CE_4E5B;
const SWAP_DOMAIN: u64 = 0xA5A5_A5A5_A5A5_A5A5;
const INIT_DOMAIN: u64 = 0x3C6E_F372_FE94_F82B;

/// Seed for one walker's proposal at `(level, iteration, sub_step)`.
pub fn move_seed(
    master_seed: u64,
    level: usize,
    iteration: usize,
    sub_step: usize,
    walker: usize,
) -> u64 {
    let per_iteration = derive_substream_seed(
        master_seed ^ MOVE_DOMAIN,
        (level as u64) << 40 | iteration as u64,
    );
    derive_substream_seed(per_iteration, (sub_step as u64) << 32 | walker as u64)
}

/// Seed for the swap step of `iteration` (parity and pairings).
pub fn swap_seed(master_seed: u64, iteration: usize) -> u64 {
    derive_substream_seed(master_seed ^ SWAP_DOMAIN, iteration as u64)
}

/// Seed for the initial draw of `walker` at `level`.
pub fn init_seed(master_seed: u64, level: usize, walker: usize) -> u64 {
    derive_substream_seed(
        master_seed ^ INIT_DOMAIN,
        (level as u64) << 32 | walker as u64,
    )
}
