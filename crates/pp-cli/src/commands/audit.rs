use anyhow::{bail, Result};
use pp_audit::{verify_hash_chain, VerifyResult};

/// `pp audit verify <path>`: prints `chain_valid=true lines=N` or fails with
/// the first broken line.
pub fn verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("chain_valid=true lines={lines} path={path}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("chain_valid=false line={line} path={path}");
            bail!("AUDIT_CHAIN_BROKEN line={line}: {reason}");
        }
    }
}
