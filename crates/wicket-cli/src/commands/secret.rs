//! Secret generation commands.
//!
//! Handy when poking at the proxy with curl: mints the same code
//! shapes the server issues, without touching any server state.

use anyhow::Result;
use console::style;

use wicket_flow::mint::{self, MintedCodes};

/// Mints and prints a full device-flow code set.
pub fn generate_codes() -> Result<()> {
    let codes = MintedCodes::generate()?;

    println!("{}", style("Minted device flow codes:").bold().green());
    println!();
    println!("user_code={}", codes.user_code);
    println!("device_code={}", codes.device_code);
    println!("pkce_verifier={}", codes.pkce_verifier);
    println!();
    println!(
        "{}",
        style("These are samples only; the server mints its own per flow.").dim()
    );

    Ok(())
}

/// Mints and prints a CSRF state token.
pub fn generate_state() -> Result<()> {
    let state = mint::new_state()?;

    println!("{}", style("Minted state token:").bold().green());
    println!();
    println!("state={state}");

    Ok(())
}
